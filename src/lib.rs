//! Full-sync anti-entropy coordinator
//!
//! Schedules and drives periodic tree-comparison exchanges between this
//! cluster and a paired remote cluster, repairing divergent keys found along
//! the way. A single actor task (see [`coordinator`]) owns the schedule and
//! in-flight-exchange state; callers interact with it through a cheaply
//! cloneable [`coordinator::CoordinatorHandle`].
//!
//! # Modules
//!
//! - [`domain`]: shared types (`WorkItemKind`, `Scope`, `ScheduleWants`, ...)
//! - [`schedule`]: daily plan generation and wall-clock dispatch
//! - [`exchange`]: scope/work-item filtering and the exchange driver
//! - [`vclock`]: vector clocks used to compare replica versions
//! - [`repair`]: divergence-to-repair-item decision logic
//! - [`membership`]: cluster membership oracle seam
//! - [`replication_queue`]: best-effort repair fan-out seam
//! - [`http_client`]: the AAE HTTP surface the driver calls
//! - [`coordinator`]: the actor and its public handle
//! - [`config`]: layered configuration loading and validation
//! - [`time`]: injectable clock seam
//! - [`error`]: crate-wide error taxonomy

#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod exchange;
pub mod http_client;
pub mod membership;
pub mod repair;
pub mod replication_queue;
pub mod schedule;
pub mod time;
pub mod vclock;

pub use coordinator::{CoordinatorHandle, CoordinatorInit};
pub use domain::{BucketId, Scope, ScheduleWants, WorkItemKind};
pub use error::{CoordinatorError, Result};

/// Coordinator crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

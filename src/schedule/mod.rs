//! Daily schedule planning and per-node slice dispatch.
//!
//! `planner` turns a day's [`crate::domain::ScheduleWants`] quotas into a
//! slice-ordered [`crate::domain::Allocation`] list; `dispatcher` walks that
//! list against the wall clock, firing each slice's work-item at its
//! computed, per-node-staggered time.

pub mod dispatcher;
pub mod planner;

pub use dispatcher::{DispatchOutcome, SliceDispatcher};
pub use planner::plan_day;

//! Exchange engine interface
//!
//! The engine that actually walks two Merkle trees and decides which
//! segments diverge is an external collaborator (spec.md treats it as given,
//! supplied by the surrounding cluster runtime) — this module only defines
//! the seam the driver calls through: start one exchange given the derived
//! filter/n-val parameters and a small bundle of callbacks, get back a
//! handle. Grounded on `mofa-foundation/orchestrator/traits.rs`'s
//! `ModelOrchestrator` (an `#[async_trait]` trait over `Send + Sync`,
//! returning a crate-local `Result`, documented per-method with "implementers
//! handle:" framing).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::BucketId;
use crate::error::{ExchangeError, HttpClientError};
use crate::exchange::filter::ExchangePlan;
use crate::vclock::VClock;

/// Identifies one in-flight exchange.
pub type ExchangeId = Uuid;

/// One `(bucket, key)` divergence the engine reports to the repair-fun
/// callback, paired with the clocks observed on each side.
#[derive(Clone, Debug)]
pub struct Divergence {
    /// Bucket the key belongs to.
    pub bucket: BucketId,
    /// Key within the bucket.
    pub key: Vec<u8>,
    /// Vector clock observed on the source (this node) side, if any.
    pub source_clock: Option<VClock>,
    /// Vector clock observed on the sink (remote) side, if any.
    pub sink_clock: Option<VClock>,
}

/// A request the send-fun callback must satisfy against one side (local or
/// remote) of the exchange.
#[derive(Clone, Debug)]
pub enum SendRequest {
    /// Fetch the side's top-level Merkle root.
    FetchRoot,
    /// Fetch branch-level hashes for the given branch ids.
    FetchBranches(Vec<u64>),
    /// Fetch `(bucket, key, vclock)` triples for the given segment ids.
    FetchClocks(Vec<u64>),
    /// Build/import a tree over a bucket key range at the given granularity.
    MergeTreeRange {
        /// Bucket to scan.
        bucket: BucketId,
        /// Tree granularity requested.
        tree_size: super::filter::TreeSize,
    },
    /// Fetch `(bucket, key, vclock)` triples over a bucket key range,
    /// restricted to a modification-time window.
    FetchClocksRange {
        /// Bucket to scan.
        bucket: BucketId,
        /// Inclusive modification-time window, if restricted.
        mod_range: Option<super::filter::ModRange>,
    },
}

/// One side's reply to a [`SendRequest`]. Opaque to the driver; the engine
/// interprets it against its own tree-walk state.
#[derive(Clone, Debug)]
pub struct SendResponse(pub Vec<u8>);

/// Callback bundle the driver constructs for one exchange. Each method
/// captures only immutable per-exchange context (client handle, n-val,
/// exchange id, queue name) — no shared mutable state.
#[async_trait]
pub trait ExchangeCallbacks: Send + Sync {
    /// Dispatch `request` against the local side and return its response.
    /// Must run concurrently with the matching remote-side call; callers
    /// must tolerate either completing first.
    async fn send_local(&self, request: SendRequest) -> Result<SendResponse, HttpClientError>;

    /// Dispatch `request` against the remote side and return its response.
    async fn send_remote(&self, request: SendRequest) -> Result<SendResponse, HttpClientError>;

    /// Hand a completed divergence list to the Repair Decider.
    async fn repair(&self, divergences: Vec<Divergence>);

    /// Called once the engine has fully completed the exchange (tree walk
    /// finished, repair-fun invoked). Forwards to the original requester if
    /// one was supplied, then signals the coordinator to drop back to its
    /// normal post-action wait.
    async fn reply_complete(&self, exchange_id: ExchangeId);
}

/// A running exchange's handle, returned by [`ExchangeEngine::start_exchange`].
#[derive(Debug, Clone, Copy)]
pub struct ExchangeHandle {
    /// The exchange's id, used to correlate a late reply against the
    /// coordinator's `exchange_epoch` fence.
    pub id: ExchangeId,
}

/// Parameters for starting one exchange, as derived by
/// [`crate::exchange::filter::derive`].
#[derive(Clone, Debug)]
pub struct ExchangeParams {
    /// Scope/work-item-derived filter, n-val, and reference plan.
    pub plan: ExchangePlan,
}

/// The tree-comparison engine the driver starts exchanges against.
/// Implemented externally; this crate only defines the seam.
#[async_trait]
pub trait ExchangeEngine: Send + Sync {
    /// Start one exchange. Returns immediately with a handle; the engine
    /// drives the tree walk asynchronously via `callbacks`, culminating in a
    /// `repair` call and then a `reply_complete` call.
    async fn start_exchange(
        &self,
        params: ExchangeParams,
        callbacks: Box<dyn ExchangeCallbacks>,
    ) -> Result<ExchangeHandle, ExchangeError>;
}

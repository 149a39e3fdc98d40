//! Crate-wide error taxonomy
//!
//! Mirrors the error categories from the coordinator's design: configuration
//! mistakes, transient connectivity failures, exchange protocol/crash
//! failures, and control-operation errors. Leaf errors from each adapter
//! convert into [`CoordinatorError`] via `#[from]`, the way the teacher
//! crate's `ConsensusError` aggregates `RaftError`/`ReplicationError`.

use thiserror::Error;

/// Top-level coordinator error.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Scope/quota/endpoint configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A remote or local cluster was unreachable (ping failed, connect
    /// refused). Always recovered locally; never propagated to a caller.
    #[error("transient connectivity error: {0}")]
    Transient(#[from] HttpClientError),

    /// The exchange engine reported a protocol-level failure mid-exchange.
    #[error("exchange protocol error: {0}")]
    ExchangeProtocol(#[from] ExchangeError),

    /// No reply arrived before the crash-timeout elapsed.
    #[error("exchange {0} crashed: no reply before timeout")]
    ExchangeCrash(uuid::Uuid),

    /// A control operation (pause/resume/...) was invalid given current state.
    #[error("control operation error: {0}")]
    ControlOperation(#[from] ControlError),

    /// The replication queue rejected or failed to accept a batch.
    #[error("replication queue error: {0}")]
    Queue(#[from] QueueError),

    /// A manually-triggered `process_workitem` arrived while another
    /// exchange was already in flight; the at-most-one-in-flight invariant
    /// forbids starting a second one.
    #[error("an exchange is already in flight")]
    ExchangeInProgress,

    /// The coordinator actor is no longer running (its mailbox was dropped).
    #[error("coordinator actor has stopped")]
    Stopped,
}

/// Errors from the control API (`pause`, `resume`, `set_*`).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// `pause` called while already paused.
    #[error("already paused")]
    AlreadyPaused,
    /// `resume` called while not paused.
    #[error("not paused")]
    NotPaused,
}

/// Errors from the HTTP client adapter.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The peer did not respond, or responded with a transport-level error.
    #[error("request failed: {0}")]
    Request(String),
    /// The peer responded but the payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),
    /// The engine issued a request shape the current exchange plan can't
    /// satisfy (e.g. an n-val-scoped request against a range-scoped plan).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Errors surfaced by the (externally supplied) exchange engine.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The engine rejected the requested scope/work-item combination.
    #[error("rejected exchange: {0}")]
    Rejected(String),
    /// A send-fun callback failed to retrieve the requested data.
    #[error("send-fun failed: {0}")]
    SendFailed(String),
}

/// Errors from the replication-queue adapter.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue could not accept the batch (best-effort; not retried here).
    #[error("enqueue failed: {0}")]
    EnqueueFailed(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

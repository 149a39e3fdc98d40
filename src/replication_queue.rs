//! Replication queue sink
//!
//! The Repair Decider hands its requeue list to this interface rather than
//! replicating directly, so the change fans out through the cluster's
//! general replication path to every destination cluster, not only the sink
//! participating in the current exchange. Grounded on `replication.rs`'s
//! `ReplicationManager` (best-effort enqueue, logged, no retry at this
//! layer).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

use crate::error::QueueError;
use crate::repair::RepairItem;

/// Sink for repair items, named by a configured queue name.
#[async_trait]
pub trait ReplicationQueue: Send + Sync {
    /// Best-effort enqueue of `items` under `queue_name`. Implementations
    /// should not retry internally; the coordinator does not block waiting
    /// for delivery confirmation.
    async fn enqueue(&self, queue_name: &str, items: Vec<RepairItem>) -> Result<(), QueueError>;
}

/// In-memory queue sink, the crate's default: used directly in tests and as
/// a drop-in placeholder until a real replication transport is wired in.
#[derive(Debug, Default)]
pub struct InMemoryReplicationQueue {
    queues: Mutex<HashMap<String, Vec<RepairItem>>>,
}

#[async_trait]
impl ReplicationQueue for InMemoryReplicationQueue {
    async fn enqueue(&self, queue_name: &str, items: Vec<RepairItem>) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut queues = self.queues.lock();
        queues.entry(queue_name.to_string()).or_default().extend(items);
        Ok(())
    }
}

impl InMemoryReplicationQueue {
    /// Remove and return everything queued under `queue_name`, for test
    /// assertions.
    pub fn drain(&self, queue_name: &str) -> Vec<RepairItem> {
        self.queues.lock().remove(queue_name).unwrap_or_default()
    }
}

/// A queue sink that always fails, used to exercise the coordinator's
/// error-logging path without standing up a real transport.
#[derive(Debug, Default)]
pub struct FailingReplicationQueue;

#[async_trait]
impl ReplicationQueue for FailingReplicationQueue {
    async fn enqueue(&self, queue_name: &str, items: Vec<RepairItem>) -> Result<(), QueueError> {
        warn!(queue_name, count = items.len(), "replication queue unavailable");
        Err(QueueError::EnqueueFailed(format!(
            "queue {queue_name} unavailable"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BucketId;
    use crate::vclock::VClock;

    fn item() -> RepairItem {
        RepairItem {
            bucket: BucketId::new("b", "t"),
            key: b"k".to_vec(),
            source_clock: VClock::new(),
        }
    }

    #[tokio::test]
    async fn enqueue_then_drain_round_trips() {
        let queue = InMemoryReplicationQueue::default();
        queue.enqueue("q1", vec![item(), item()]).await.unwrap();
        assert_eq!(queue.drain("q1").len(), 2);
        assert!(queue.drain("q1").is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let queue = InMemoryReplicationQueue::default();
        queue.enqueue("q1", vec![]).await.unwrap();
        assert!(queue.drain("q1").is_empty());
    }

    #[tokio::test]
    async fn failing_queue_reports_enqueue_error() {
        let queue = FailingReplicationQueue;
        let err = queue.enqueue("q1", vec![item()]).await.unwrap_err();
        assert!(matches!(err, QueueError::EnqueueFailed(_)));
    }
}

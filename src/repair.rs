//! Repair decider
//!
//! Partitions a divergence list reported by the exchange engine into
//! sink-ahead (logged only, never re-replicated — the sink is already
//! newer) and source-ahead/concurrent/sink-missing (requeued for
//! replication). Grounded on `gossip/protocol.rs`'s `merge_peer_states`:
//! iterate a collection, classify each entry by a dominance check, count
//! both outcomes, log the counts, return a summary.

use tracing::info;

use crate::domain::BucketId;
use crate::error::QueueError;
use crate::exchange::engine::Divergence;
use crate::replication_queue::ReplicationQueue;
use crate::vclock::{dominates, VClock};

/// One entry handed to the replication queue: the source's clock is carried
/// along so the queue can skip re-fetching it.
#[derive(Clone, Debug)]
pub struct RepairItem {
    /// Bucket the key belongs to.
    pub bucket: BucketId,
    /// Key within the bucket.
    pub key: Vec<u8>,
    /// The clock observed on the source (this node) side.
    pub source_clock: VClock,
}

/// Outcome of partitioning one exchange's divergence list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Entries where the sink already dominated the source (logged only).
    pub sink_ahead: usize,
    /// Entries requeued for replication.
    pub repaired: usize,
}

/// Partition `divergences`, log counts at each stage, and hand the
/// source-ahead entries to `queue` under `queue_name`.
pub async fn decide(
    divergences: Vec<Divergence>,
    queue: &dyn ReplicationQueue,
    queue_name: &str,
) -> Result<RepairStats, QueueError> {
    info!(count = divergences.len(), "repair decider starting");

    let mut sink_ahead = 0usize;
    let mut repair_list = Vec::with_capacity(divergences.len());

    for divergence in divergences {
        if dominates(divergence.sink_clock.as_ref(), divergence.source_clock.as_ref()) {
            sink_ahead += 1;
            continue;
        }

        let Some(source_clock) = divergence.source_clock else {
            // No source clock and the sink didn't dominate (so it's also
            // missing or equally absent) — nothing to repair from.
            continue;
        };

        repair_list.push(RepairItem {
            bucket: divergence.bucket,
            key: divergence.key,
            source_clock,
        });
    }

    info!(sink_ahead, "repair decider sink-ahead count");
    info!(to_repair = repair_list.len(), "repair decider repair count");

    let repaired = repair_list.len();
    queue.enqueue(queue_name, repair_list).await?;

    info!(sink_ahead, repaired, "repair decider completed");
    Ok(RepairStats { sink_ahead, repaired })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication_queue::InMemoryReplicationQueue;

    fn vc(counter: u64) -> VClock {
        VClock::from_entries([("n1".to_string(), counter)])
    }

    fn divergence(bucket: &str, key: &str, source: Option<VClock>, sink: Option<VClock>) -> Divergence {
        Divergence {
            bucket: BucketId::new(bucket, "t"),
            key: key.as_bytes().to_vec(),
            source_clock: source,
            sink_clock: sink,
        }
    }

    #[tokio::test]
    async fn sink_dominating_source_is_logged_not_repaired() {
        let divergences = vec![divergence("b", "k1", Some(vc(1)), Some(vc(2)))];
        let queue = InMemoryReplicationQueue::default();
        let stats = decide(divergences, &queue, "q").await.unwrap();
        assert_eq!(stats.sink_ahead, 1);
        assert_eq!(stats.repaired, 0);
        assert!(queue.drain("q").is_empty());
    }

    #[tokio::test]
    async fn source_ahead_is_requeued() {
        let divergences = vec![divergence("b", "k1", Some(vc(2)), Some(vc(1)))];
        let queue = InMemoryReplicationQueue::default();
        let stats = decide(divergences, &queue, "q").await.unwrap();
        assert_eq!(stats.sink_ahead, 0);
        assert_eq!(stats.repaired, 1);
        assert_eq!(queue.drain("q").len(), 1);
    }

    #[tokio::test]
    async fn missing_sink_clock_is_requeued() {
        let divergences = vec![divergence("b", "k1", Some(vc(1)), None)];
        let queue = InMemoryReplicationQueue::default();
        let stats = decide(divergences, &queue, "q").await.unwrap();
        assert_eq!(stats.repaired, 1);
    }

    #[tokio::test]
    async fn missing_source_clock_counts_as_sink_ahead() {
        let divergences = vec![divergence("b", "k1", None, Some(vc(1)))];
        let queue = InMemoryReplicationQueue::default();
        let stats = decide(divergences, &queue, "q").await.unwrap();
        assert_eq!(stats.sink_ahead, 1);
        assert_eq!(stats.repaired, 0);
    }

    #[tokio::test]
    async fn concurrent_clocks_are_requeued() {
        let a = VClock::from_entries([("n1".to_string(), 2), ("n2".to_string(), 0)]);
        let b = VClock::from_entries([("n1".to_string(), 0), ("n2".to_string(), 2)]);
        let divergences = vec![divergence("b", "k1", Some(a), Some(b))];
        let queue = InMemoryReplicationQueue::default();
        let stats = decide(divergences, &queue, "q").await.unwrap();
        assert_eq!(stats.sink_ahead, 0);
        assert_eq!(stats.repaired, 1);
    }

    use proptest::prelude::any;

    proptest::proptest! {
        #[test]
        fn invariant_partition_soundness(
            source_counters in proptest::collection::vec(0u64..5, 1..6),
            sink_counters in proptest::collection::vec(0u64..5, 1..6),
            source_present in any::<bool>(),
            sink_present in any::<bool>(),
        ) {
            let source = source_present.then(|| VClock::from_entries(
                source_counters.iter().enumerate().map(|(i, c)| (format!("n{i}"), *c)),
            ));
            let sink = sink_present.then(|| VClock::from_entries(
                sink_counters.iter().enumerate().map(|(i, c)| (format!("n{i}"), *c)),
            ));
            let expect_sink_ahead = dominates(sink.as_ref(), source.as_ref());
            let divergences = vec![divergence("b", "k1", source, sink)];

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let queue = InMemoryReplicationQueue::default();
            let stats = rt.block_on(decide(divergences, &queue, "q")).unwrap();

            if expect_sink_ahead {
                proptest::prop_assert_eq!(stats.sink_ahead, 1);
                proptest::prop_assert_eq!(stats.repaired, 0);
            } else {
                proptest::prop_assert_eq!(stats.sink_ahead, 0);
            }
        }
    }
}

//! Core data model shared across the scheduler, exchange driver, and
//! coordinator: work-item kinds, scope, quotas, allocations, and node
//! position within the cluster. See spec.md §3.

use serde::{Deserialize, Serialize};

/// One of the four dispatchable work-items.
///
/// `NoSync` is a quota-holder that does nothing; `AllSync` compares
/// everything under the configured n-val; `DaySync`/`HourSync` compare only
/// objects whose last-modified timestamp falls in the trailing 24h / 1h
/// window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkItemKind {
    /// No-op quota-holder.
    NoSync,
    /// Full comparison under the configured n-val.
    AllSync,
    /// Comparison restricted to the trailing 24h window.
    DaySync,
    /// Comparison restricted to the trailing 1h window.
    HourSync,
}

/// An opaque bucket identifier (`(bucket, bucket_type)` pair collapsed into
/// one value, as spec.md §6 describes: "the pair forms a single initial
/// bucket identifier").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketId {
    /// Bucket name.
    pub bucket: Vec<u8>,
    /// Bucket type.
    pub bucket_type: Vec<u8>,
}

impl BucketId {
    /// Construct a bucket identifier from its two components.
    pub fn new(bucket: impl Into<Vec<u8>>, bucket_type: impl Into<Vec<u8>>) -> Self {
        Self {
            bucket: bucket.into(),
            bucket_type: bucket_type.into(),
        }
    }
}

/// Whether the coordinator compares by n-val, by a rotating bucket list, or
/// is disabled entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Scope {
    /// Compare entire key-space under `(local_nval, remote_nval)`. Only
    /// `AllSync`/`NoSync` are meaningful; `Day`/`HourSync` are invalid here.
    All {
        /// n-val on the local cluster.
        local_nval: u32,
        /// n-val on the remote cluster.
        remote_nval: u32,
    },
    /// Compare by a rotating list of buckets; all four work-items are valid.
    Bucket {
        /// Ordered, rotating bucket list (head is next to drain).
        buckets: Vec<BucketId>,
    },
    /// Schedule degenerates to 24 `NoSync` slices (one per hour).
    Disabled,
}

impl Scope {
    /// Whether `kind` is a valid work-item under this scope.
    pub fn accepts(&self, kind: WorkItemKind) -> bool {
        match self {
            Scope::All { .. } => matches!(kind, WorkItemKind::NoSync | WorkItemKind::AllSync),
            Scope::Bucket { .. } => true,
            Scope::Disabled => kind == WorkItemKind::NoSync,
        }
    }
}

/// Ordered quotas `(no_sync, all_sync, day_sync, hour_sync)`. Their sum is
/// the slice count used for the 24h plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWants {
    /// Number of `NoSync` slices in the day's plan.
    pub no_sync: u32,
    /// Number of `AllSync` slices.
    pub all_sync: u32,
    /// Number of `DaySync` slices.
    pub day_sync: u32,
    /// Number of `HourSync` slices.
    pub hour_sync: u32,
}

impl ScheduleWants {
    /// Construct quotas from the ordered tuple.
    pub fn new(no_sync: u32, all_sync: u32, day_sync: u32, hour_sync: u32) -> Self {
        Self {
            no_sync,
            all_sync,
            day_sync,
            hour_sync,
        }
    }

    /// The degenerate `Disabled`-scope schedule: 24 `NoSync` slices.
    pub fn disabled() -> Self {
        Self::new(24, 0, 0, 0)
    }

    /// The all-`NoSync` schedule used while paused.
    pub fn all_no_sync(slice_count: u32) -> Self {
        Self::new(slice_count, 0, 0, 0)
    }

    /// Sum of all four quotas. `SliceCount` in spec.md's terms.
    pub fn slice_count(&self) -> u32 {
        self.no_sync + self.all_sync + self.day_sync + self.hour_sync
    }
}

/// One entry of a day's plan: a 1-based slice index paired with the
/// work-item to dispatch when that slice fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// 1-based slice index, in `[1, SliceCount]`.
    pub slice: u32,
    /// Work-item to dispatch at this slice.
    pub kind: WorkItemKind,
}

/// This node's position among the currently up nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeInfo {
    /// 1-based ordinal of this node in the sorted list of up nodes.
    pub node_ordinal: u32,
    /// Total number of currently up nodes.
    pub node_count: u32,
}

impl NodeInfo {
    /// Construct node info, enforcing `1 <= node_ordinal <= node_count`.
    pub fn new(node_ordinal: u32, node_count: u32) -> Self {
        assert!(
            node_ordinal >= 1 && node_ordinal <= node_count,
            "node_ordinal {node_ordinal} out of range [1, {node_count}]"
        );
        Self {
            node_ordinal,
            node_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_scope_only_accepts_no_sync() {
        let scope = Scope::Disabled;
        assert!(scope.accepts(WorkItemKind::NoSync));
        assert!(!scope.accepts(WorkItemKind::AllSync));
        assert!(!scope.accepts(WorkItemKind::HourSync));
    }

    #[test]
    fn all_scope_rejects_day_and_hour() {
        let scope = Scope::All {
            local_nval: 3,
            remote_nval: 3,
        };
        assert!(scope.accepts(WorkItemKind::AllSync));
        assert!(scope.accepts(WorkItemKind::NoSync));
        assert!(!scope.accepts(WorkItemKind::DaySync));
        assert!(!scope.accepts(WorkItemKind::HourSync));
    }

    #[test]
    fn bucket_scope_accepts_everything() {
        let scope = Scope::Bucket { buckets: vec![] };
        for kind in [
            WorkItemKind::NoSync,
            WorkItemKind::AllSync,
            WorkItemKind::DaySync,
            WorkItemKind::HourSync,
        ] {
            assert!(scope.accepts(kind));
        }
    }

    #[test]
    fn slice_count_is_sum_of_quotas() {
        let wants = ScheduleWants::new(1, 2, 3, 4);
        assert_eq!(wants.slice_count(), 10);
    }

    #[test]
    #[should_panic]
    fn node_info_rejects_out_of_range_ordinal() {
        NodeInfo::new(0, 8);
    }
}

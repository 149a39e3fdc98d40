//! Scope × work-item → exchange parameter mapping
//!
//! Pure translation table (spec.md §4.3): given the configured [`Scope`] and
//! the [`WorkItemKind`] the dispatcher just picked, derive the n-val pair,
//! the tree/key/time filter to hand the exchange engine, whether the
//! requester gets a `full` or `partial` reference, and how (if at all) the
//! bucket list should rotate. `All × Hour/DaySync` has no valid mapping and
//! is rejected. Grounded on `gossip/merkle.rs`'s `MerkleFilter`/`TreeSize`
//! shapes (tree-size-by-segment-count enum, filter-as-small-struct) and
//! `gossip/protocol.rs`'s pattern of a pure function returning an enum
//! outcome for the caller to act on.

use serde::{Deserialize, Serialize};

use crate::domain::{BucketId, Scope, WorkItemKind};
use crate::time::EpochSecs;

/// Relative tree granularity, scaling with the comparison time window:
/// wider windows get bigger trees to keep false-positive divergence low.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeSize {
    /// Used for `AllSync` range comparisons (unbounded window).
    Large,
    /// Used for `DaySync` (24h window).
    Medium,
    /// Used for `HourSync` (1h window).
    Small,
}

/// Whether the requester receives the full imported tree or only a partial
/// one scoped to the bucket under comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeRef {
    /// Entire keyspace, unscoped.
    Full,
    /// Scoped to one bucket.
    Partial,
}

/// What should happen to the rotating bucket list after this exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketListUpdate {
    /// `Scope::All` has no bucket list to rotate.
    Unchanged,
    /// Pop the head bucket and push it to the tail: `T ++ [H]`.
    Rotate {
        /// The bucket that was compared this exchange (the old head).
        compared: BucketId,
    },
}

/// Either a fixed n-val pulled from scope configuration, or `range`,
/// meaning the exchange engine derives it per-bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NValSource {
    /// Use this configured n-val directly.
    Configured(u32),
    /// Defer to the bucket's own range n-val.
    Range,
}

/// The inclusive time window a `Day`/`HourSync` filter restricts to,
/// `[now - window, now]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRange {
    /// Window start, inclusive.
    pub from: EpochSecs,
    /// Window end, inclusive (always `now`).
    pub to: EpochSecs,
}

/// The derived filter to hand the exchange engine for one exchange step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// `All × AllSync`: no filter, compare everything under the n-vals.
    None,
    /// `Bucket × {All,Hour,Day}Sync`: scoped to one bucket, with a time
    /// window for `Hour`/`DaySync` and none for `AllSync`.
    TreeRange {
        /// The bucket under comparison (the rotating list's head).
        bucket: BucketId,
        /// Tree granularity for this window.
        tree_size: TreeSize,
        /// `None` for `AllSync` (all-times); `Some` for `Hour`/`DaySync`.
        mod_range: Option<ModRange>,
    },
}

/// Everything the Exchange Driver needs to start one exchange, derived from
/// scope and work-item kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangePlan {
    /// Local cluster n-val source.
    pub local_nval: NValSource,
    /// Remote cluster n-val source.
    pub remote_nval: NValSource,
    /// Filter to hand the exchange engine.
    pub filter: Filter,
    /// Reference scope reported back to the requester.
    pub reference: ExchangeRef,
    /// Bucket-list rotation to apply after the exchange.
    pub bucket_list_update: BucketListUpdate,
}

/// Why a scope × work-item combination has no valid exchange mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterRejected(pub String);

/// Derive the exchange parameters for `scope`/`kind` at `now`. `NoSync`
/// never reaches this function (the dispatcher does not invoke the driver
/// for it); callers should not call this with `WorkItemKind::NoSync`.
pub fn derive(scope: &Scope, kind: WorkItemKind, now: EpochSecs) -> Result<ExchangePlan, FilterRejected> {
    match (scope, kind) {
        (Scope::All { local_nval, remote_nval }, WorkItemKind::AllSync) => Ok(ExchangePlan {
            local_nval: NValSource::Configured(*local_nval),
            remote_nval: NValSource::Configured(*remote_nval),
            filter: Filter::None,
            reference: ExchangeRef::Full,
            bucket_list_update: BucketListUpdate::Unchanged,
        }),
        (Scope::All { .. }, WorkItemKind::DaySync | WorkItemKind::HourSync) => Err(FilterRejected(format!(
            "scope All has no valid exchange mapping for {kind:?}"
        ))),
        (Scope::All { .. }, WorkItemKind::NoSync) => Err(FilterRejected(
            "NoSync never starts an exchange".to_string(),
        )),
        (Scope::Bucket { buckets }, WorkItemKind::AllSync | WorkItemKind::DaySync | WorkItemKind::HourSync) => {
            let head = buckets
                .first()
                .cloned()
                .ok_or_else(|| FilterRejected("bucket scope has an empty bucket list".to_string()))?;
            let (tree_size, mod_range) = match kind {
                WorkItemKind::AllSync => (TreeSize::Large, None),
                WorkItemKind::DaySync => (
                    TreeSize::Medium,
                    Some(ModRange {
                        from: now.saturating_sub(86_400),
                        to: now,
                    }),
                ),
                WorkItemKind::HourSync => (
                    TreeSize::Small,
                    Some(ModRange {
                        from: now.saturating_sub(3_600),
                        to: now,
                    }),
                ),
                WorkItemKind::NoSync => unreachable!("excluded by outer match"),
            };
            Ok(ExchangePlan {
                local_nval: NValSource::Range,
                remote_nval: NValSource::Range,
                filter: Filter::TreeRange {
                    bucket: head.clone(),
                    tree_size,
                    mod_range,
                },
                reference: ExchangeRef::Partial,
                bucket_list_update: BucketListUpdate::Rotate { compared: head },
            })
        }
        (Scope::Bucket { .. }, WorkItemKind::NoSync) => {
            Err(FilterRejected("NoSync never starts an exchange".to_string()))
        }
        (Scope::Disabled, _) => Err(FilterRejected(
            "scope Disabled never starts an exchange".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_allsync_is_unfiltered_full() {
        let scope = Scope::All {
            local_nval: 3,
            remote_nval: 3,
        };
        let plan = derive(&scope, WorkItemKind::AllSync, 1_000).unwrap();
        assert_eq!(plan.filter, Filter::None);
        assert_eq!(plan.reference, ExchangeRef::Full);
        assert_eq!(plan.bucket_list_update, BucketListUpdate::Unchanged);
    }

    #[test]
    fn all_hoursync_is_rejected() {
        let scope = Scope::All {
            local_nval: 3,
            remote_nval: 3,
        };
        assert!(derive(&scope, WorkItemKind::HourSync, 1_000).is_err());
        assert!(derive(&scope, WorkItemKind::DaySync, 1_000).is_err());
    }

    #[test]
    fn bucket_hoursync_windows_to_trailing_hour() {
        let head = BucketId::new("b", "t");
        let scope = Scope::Bucket {
            buckets: vec![head.clone(), BucketId::new("b2", "t")],
        };
        let now = 10_000;
        let plan = derive(&scope, WorkItemKind::HourSync, now).unwrap();
        match plan.filter {
            Filter::TreeRange { bucket, tree_size, mod_range } => {
                assert_eq!(bucket, head);
                assert_eq!(tree_size, TreeSize::Small);
                let mr = mod_range.unwrap();
                assert_eq!(mr.to, now);
                assert_eq!(mr.from, now - 3_600);
            }
            Filter::None => panic!("expected TreeRange"),
        }
        assert_eq!(plan.reference, ExchangeRef::Partial);
        assert!(matches!(plan.bucket_list_update, BucketListUpdate::Rotate { .. }));
    }

    #[test]
    fn bucket_allsync_has_no_time_window() {
        let scope = Scope::Bucket {
            buckets: vec![BucketId::new("b", "t")],
        };
        let plan = derive(&scope, WorkItemKind::AllSync, 10_000).unwrap();
        match plan.filter {
            Filter::TreeRange { tree_size, mod_range, .. } => {
                assert_eq!(tree_size, TreeSize::Large);
                assert!(mod_range.is_none());
            }
            Filter::None => panic!("expected TreeRange"),
        }
    }

    #[test]
    fn empty_bucket_list_is_rejected() {
        let scope = Scope::Bucket { buckets: vec![] };
        assert!(derive(&scope, WorkItemKind::AllSync, 1_000).is_err());
    }

    #[test]
    fn disabled_scope_always_rejected() {
        assert!(derive(&Scope::Disabled, WorkItemKind::NoSync, 1_000).is_err());
    }
}

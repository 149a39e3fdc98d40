//! Vector clocks and dominance comparison
//!
//! Generalizes the teacher's `VersionedState::compare_version`/
//! `is_newer_than` (a single monotonic integer, totally ordered) to a
//! per-node vector, partially ordered by dominance. A missing entry for a
//! node is treated as `0` (that node has never been observed advancing this
//! key), matching the usual vector-clock convention.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::HttpClientError;

/// Opaque node identifier as used over the wire by the remote/local
/// clusters (not the same type as this crate's internal node ordinals).
pub type NodeId = String;

/// A vector clock: one monotonically increasing counter per node that has
/// touched the object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VClock(BTreeMap<NodeId, u64>);

impl VClock {
    /// An empty vector clock.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a vector clock from explicit (node, counter) pairs.
    pub fn from_entries<I: IntoIterator<Item = (NodeId, u64)>>(entries: I) -> Self {
        Self(entries.into_iter().collect())
    }

    /// Decode a vector clock from its persisted wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, HttpClientError> {
        bincode::deserialize(bytes).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Encode to the wire form.
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).expect("VClock serialization is infallible")
    }

    fn counter(&self, node: &str) -> u64 {
        self.0.get(node).copied().unwrap_or(0)
    }

    /// `true` iff `self` dominates `other`: every component of `self` is
    /// `>=` the corresponding component of `other`, and at least one is
    /// strictly greater. Equal clocks do not dominate each other.
    pub fn dominates(&self, other: &VClock) -> bool {
        let nodes = self.0.keys().chain(other.0.keys());
        let mut strictly_greater = false;
        for node in nodes {
            let mine = self.counter(node);
            let theirs = other.counter(node);
            if mine < theirs {
                return false;
            }
            if mine > theirs {
                strictly_greater = true;
            }
        }
        strictly_greater
    }

    /// `true` iff neither clock dominates the other and they are not equal
    /// (a genuine causal conflict).
    pub fn concurrent_with(&self, other: &VClock) -> bool {
        self != other && !self.dominates(other) && !other.dominates(self)
    }
}

/// Dominance comparison with the null-handling rules from the Repair
/// Decider contract: a missing sink clock is unambiguously "sink behind"
/// (never dominates); a missing source clock with a present sink clock
/// means the sink dominates.
pub fn dominates(sink: Option<&VClock>, source: Option<&VClock>) -> bool {
    match (sink, source) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(sink), Some(source)) => sink.dominates(source),
    }
}

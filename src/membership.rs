//! Membership oracle
//!
//! The Coordinator and the Slice Dispatcher need only two facts from cluster
//! membership: who is up, and which of them is this node — from which
//! `NodeInfo`'s `(nodeOrdinal, nodeCount)` is derived by sorting the up-list
//! and locating self. Grounded on `network.rs`'s `PeerDiscovery`
//! (`DashMap`-backed registry, `get_all_peers`/self-identity tracking),
//! narrowed to the read-only oracle surface this coordinator needs.

use async_trait::async_trait;
use dashmap::DashSet;
use std::sync::Arc;

use crate::domain::NodeInfo;

/// Source of truth for which nodes are currently up.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// All currently up node identifiers, in no particular order.
    async fn up_nodes(&self) -> Vec<String>;

    /// This node's own identifier.
    async fn self_node(&self) -> String;
}

/// Derive `NodeInfo` from an oracle: sort the up-list, find self, and report
/// `(1-based ordinal, count)`. Returns `None` if self is not among the
/// currently up nodes (the coordinator should treat this as "not yet
/// joined" and keep waiting rather than dispatch).
pub async fn node_info(oracle: &dyn MembershipOracle) -> Option<NodeInfo> {
    let mut up = oracle.up_nodes().await;
    up.sort();
    let self_id = oracle.self_node().await;
    let position = up.iter().position(|id| id == &self_id)?;
    Some(NodeInfo::new(position as u32 + 1, up.len() as u32))
}

/// Membership oracle backed by a fixed, manually-maintained node set —
/// suitable for single-process tests and for static deployments where
/// cluster membership is supplied by configuration rather than discovered.
#[derive(Debug)]
pub struct StaticMembershipOracle {
    nodes: Arc<DashSet<String>>,
    self_id: String,
}

impl StaticMembershipOracle {
    /// Build an oracle for a node identified by `self_id`, with `nodes`
    /// (including `self_id`) as the full up-set.
    pub fn new(self_id: impl Into<String>, nodes: impl IntoIterator<Item = String>) -> Self {
        Self {
            nodes: Arc::new(nodes.into_iter().collect()),
            self_id: self_id.into(),
        }
    }

    /// Mark `node_id` as up.
    pub fn mark_up(&self, node_id: impl Into<String>) {
        self.nodes.insert(node_id.into());
    }

    /// Mark `node_id` as down.
    pub fn mark_down(&self, node_id: &str) {
        self.nodes.remove(node_id);
    }
}

#[async_trait]
impl MembershipOracle for StaticMembershipOracle {
    async fn up_nodes(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.clone()).collect()
    }

    async fn self_node(&self) -> String {
        self.self_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ordinal_reflects_sorted_position() {
        let oracle = StaticMembershipOracle::new(
            "b",
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        let info = node_info(&oracle).await.unwrap();
        assert_eq!(info.node_ordinal, 2);
        assert_eq!(info.node_count, 3);
    }

    #[tokio::test]
    async fn self_not_up_yields_none() {
        let oracle = StaticMembershipOracle::new("missing", vec!["a".to_string()]);
        assert!(node_info(&oracle).await.is_none());
    }

    #[tokio::test]
    async fn marking_down_shrinks_node_count() {
        let oracle = StaticMembershipOracle::new(
            "a",
            vec!["a".to_string(), "b".to_string()],
        );
        oracle.mark_down("b");
        let info = node_info(&oracle).await.unwrap();
        assert_eq!(info.node_count, 1);
        assert_eq!(info.node_ordinal, 1);
    }
}

//! A consistent-hash ring over virtual node replicas.
//!
//! Each logical node occupies `replicas` positions on the ring so that
//! adding or removing a node moves only a fraction of the keyspace rather
//! than reshuffling everything. Key lookup is a binary search for the
//! first ring position whose hash is >= the key's hash, wrapping around
//! to the start if the key hashes past the last position.

use std::collections::HashMap;
use std::sync::Arc;

use cachegrid_core::fnv1a_32;
use parking_lot::RwLock;

use super::adapter::Adapter;

struct RingState {
    /// Sorted ascending; parallel to nothing else -- `hash_to_node` is the
    /// source of truth for which node owns a given hash.
    hashes: Vec<u32>,
    hash_to_node: HashMap<u32, String>,
    nodes: HashMap<String, Arc<dyn Adapter>>,
}

/// A consistent-hash ring mapping keys to adapters.
pub struct NodeRouter {
    replicas: usize,
    backup_count: usize,
    state: RwLock<RingState>,
}

impl NodeRouter {
    #[must_use]
    pub fn new(replicas: usize, backup_count: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            backup_count,
            state: RwLock::new(RingState {
                hashes: Vec::new(),
                hash_to_node: HashMap::new(),
                nodes: HashMap::new(),
            }),
        }
    }

    fn replica_hash(node_id: &str, replica: usize) -> u32 {
        fnv1a_32(format!("{node_id}-{replica}").as_bytes())
    }

    /// Registers `adapter` under `node_id`, adding `replicas` virtual
    /// positions to the ring.
    pub fn add_adapter(&self, node_id: &str, adapter: Arc<dyn Adapter>) {
        let mut state = self.state.write();
        state.nodes.insert(node_id.to_string(), adapter);
        for replica in 0..self.replicas {
            let hash = Self::replica_hash(node_id, replica);
            state.hash_to_node.insert(hash, node_id.to_string());
            state.hashes.push(hash);
        }
        state.hashes.sort_unstable();
    }

    /// Removes `node_id` and all of its ring positions.
    pub fn remove_adapter(&self, node_id: &str) {
        let mut state = self.state.write();
        state.nodes.remove(node_id);
        for replica in 0..self.replicas {
            let hash = Self::replica_hash(node_id, replica);
            state.hash_to_node.remove(&hash);
        }
        let RingState { hashes, hash_to_node, .. } = &mut *state;
        hashes.retain(|h| hash_to_node.contains_key(h));
    }

    /// The adapter registered under the fixed local-node identity.
    #[must_use]
    pub fn local_adapter(&self) -> Option<Arc<dyn Adapter>> {
        self.state.read().nodes.get(LOCAL_NODE_ID).cloned()
    }

    /// The `backup_count + 1` distinct adapters responsible for `key`,
    /// walking clockwise from its ring position and wrapping around.
    #[must_use]
    pub fn adapters_for(&self, key: &str) -> Vec<Arc<dyn Adapter>> {
        let state = self.state.read();
        if state.hashes.is_empty() {
            return Vec::new();
        }

        let key_hash = fnv1a_32(key.as_bytes());
        let start = state.hashes.partition_point(|&h| h < key_hash) % state.hashes.len();

        let mut seen_nodes = Vec::new();
        let mut out = Vec::new();
        let want = (self.backup_count + 1).min(state.nodes.len());

        for offset in 0..state.hashes.len() {
            if out.len() >= want {
                break;
            }
            let idx = (start + offset) % state.hashes.len();
            let hash = state.hashes[idx];
            let Some(node_id) = state.hash_to_node.get(&hash) else {
                continue;
            };
            if seen_nodes.contains(node_id) {
                continue;
            }
            if let Some(adapter) = state.nodes.get(node_id) {
                seen_nodes.push(node_id.clone());
                out.push(Arc::clone(adapter));
            }
        }
        out
    }

    /// Every distinct adapter currently registered.
    #[must_use]
    pub fn all_adapters(&self) -> Vec<Arc<dyn Adapter>> {
        self.state.read().nodes.values().cloned().collect()
    }
}

/// The fixed identity under which this process's own adapter is always
/// registered.
pub const LOCAL_NODE_ID: &str = "local-node";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::adapter::LocalAdapter;
    use crate::storage::ShardedStore;
    use cachegrid_core::TtlPolicy;

    fn adapter() -> Arc<dyn Adapter> {
        Arc::new(LocalAdapter::new(ShardedStore::new(4, TtlPolicy::new(60, 3600))))
    }

    #[test]
    fn empty_ring_returns_no_adapters() {
        let router = NodeRouter::new(3, 0);
        assert!(router.adapters_for("k").is_empty());
    }

    #[test]
    fn single_node_is_returned_for_any_key() {
        let router = NodeRouter::new(3, 0);
        router.add_adapter(LOCAL_NODE_ID, adapter());
        assert_eq!(router.adapters_for("any-key").len(), 1);
        assert!(router.local_adapter().is_some());
    }

    #[test]
    fn remove_adapter_empties_its_ring_positions() {
        let router = NodeRouter::new(3, 0);
        router.add_adapter(LOCAL_NODE_ID, adapter());
        router.remove_adapter(LOCAL_NODE_ID);
        assert!(router.adapters_for("k").is_empty());
        assert!(router.all_adapters().is_empty());
    }

    #[test]
    fn lookup_is_deterministic_for_a_fixed_ring() {
        let router = NodeRouter::new(3, 0);
        router.add_adapter(LOCAL_NODE_ID, adapter());
        let first = router.adapters_for("stable-key");
        let second = router.adapters_for("stable-key");
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn multi_node_ring_can_return_more_than_one_adapter() {
        let router = NodeRouter::new(3, 1);
        router.add_adapter("node-a", adapter());
        router.add_adapter("node-b", adapter());
        let adapters = router.adapters_for("some-key");
        assert_eq!(adapters.len(), 2);
    }
}

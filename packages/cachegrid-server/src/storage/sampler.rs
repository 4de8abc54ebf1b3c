//! Periodic sampled active expiration.
//!
//! Correctness never depends on this task -- reads already treat expired
//! items as absent (see [`crate::storage::shard::ShardedStore::get`]). The
//! sampler exists only to bound how long expired tombstones linger in
//! memory, with a fixed per-tick work budget so its cost never scales with
//! cache size.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::debug;

use super::shard::ShardedStore;

/// Spawns the background expiry sampler as a tokio task.
///
/// Every `interval`, picks up to `shards_per_tick` distinct shard indices at
/// random, scans each for expired entries, deletes them (emitting a DEL log
/// entry for each), and stops once `shards_per_tick` shards have been
/// examined -- not once `shards_per_tick` deletions have happened.
pub fn spawn(
    store: ShardedStore,
    interval: Duration,
    shards_per_tick: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = run_once(&store, shards_per_tick);
            if removed > 0 {
                debug!(removed, "expiry sampler reclaimed expired keys");
            }
        }
    })
}

/// Runs a single sampling pass and returns the number of keys removed.
///
/// Exposed separately from [`spawn`] so it can be driven deterministically
/// in tests without waiting on a timer.
pub fn run_once(store: &ShardedStore, shards_per_tick: usize) -> usize {
    let total_shards = store.shard_count();
    let sample = shards_per_tick.min(total_shards);

    let mut indices: Vec<usize> = (0..total_shards).collect();
    indices.partial_shuffle(&mut rand::rng(), sample);
    let mut chosen: Vec<usize> = indices.into_iter().take(sample).collect();
    chosen.sort_unstable();

    store.expire_sample(&chosen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachegrid_core::{now_unix, TtlPolicy};

    #[test]
    fn run_once_reclaims_expired_keys_within_sampled_shards() {
        let store = ShardedStore::new(4, TtlPolicy::new(60, 3600));
        store.set("a", b"1".to_vec(), 100);
        store.set("b", b"2".to_vec(), 100);

        // Force both entries into the past without going through the
        // public API (which would treat them as already gone).
        store.force_expire_for_test("a");
        store.force_expire_for_test("b");

        let removed = run_once(&store, 4);
        assert_eq!(removed, 2);
        assert!(store.keys().is_empty());
        let _ = now_unix();
    }

    #[test]
    fn run_once_is_a_no_op_on_empty_store() {
        let store = ShardedStore::new(4, TtlPolicy::new(60, 3600));
        assert_eq!(run_once(&store, 4), 0);
    }
}

//! The sharded, TTL-aware key-value store.
//!
//! Keys are routed to one of `S` fixed shards by `fnv1a_32(key) % S`. Each
//! shard is guarded by its own reader-writer lock, so unrelated keys never
//! contend. Operations that must touch more than one shard (`keys`,
//! `flush`, `mget`, `mset`) acquire shard locks in ascending index order and
//! release in descending order -- this total order makes deadlock
//! impossible regardless of how many such operations run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use cachegrid_core::{now_unix, CacheError, CacheItem, CacheResult, Command, TtlPolicy};
use parking_lot::RwLock;

use crate::durability::PersistentCoordinator;

type Shard = RwLock<HashMap<String, CacheItem>>;

/// A partitioned, TTL-aware key-value store.
///
/// Cloning is cheap: the store is reference-counted internally via
/// `Arc<[Shard]>`, so handing copies to request handlers does not copy
/// shard contents.
pub struct ShardedStore {
    shards: Arc<[Shard]>,
    policy: TtlPolicy,
    durability: Option<Arc<PersistentCoordinator>>,
}

impl Clone for ShardedStore {
    fn clone(&self) -> Self {
        Self {
            shards: Arc::clone(&self.shards),
            policy: self.policy,
            durability: self.durability.clone(),
        }
    }
}

impl ShardedStore {
    /// Builds an empty store with `shard_count` shards.
    #[must_use]
    pub fn new(shard_count: usize, policy: TtlPolicy) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into();
        Self {
            shards,
            policy,
            durability: None,
        }
    }

    /// Attaches a durability coordinator; every mutating op will enqueue a
    /// command to it after applying the mutation locally.
    #[must_use]
    pub fn with_durability(mut self, coordinator: Arc<PersistentCoordinator>) -> Self {
        self.durability = Some(coordinator);
        self
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_index(&self, key: &str) -> usize {
        (cachegrid_core::fnv1a_32(key.as_bytes()) as usize) % self.shards.len()
    }

    fn log(&self, cmd: Command) {
        if let Some(coordinator) = &self.durability {
            coordinator.write_aof(cmd);
        }
    }

    /// Takes a consistent point-in-time copy of every live (non-expired or
    /// persistent) key, for the durability coordinator's snapshot step.
    ///
    /// Locks shards in ascending order and releases in descending order.
    #[must_use]
    pub fn snapshot_copy(&self) -> HashMap<String, CacheItem> {
        let now = now_unix();
        let mut out = HashMap::new();
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            guards.push(shard.read());
        }
        for guard in &guards {
            for (k, v) in guard.iter() {
                if !v.is_expired(now) {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        while guards.pop().is_some() {}
        out
    }

    /// Replaces the entire store content with `items` (used by recovery).
    /// Does not emit durability log entries -- recovery replays from the
    /// log it is itself loading from.
    pub fn load_all(&self, items: HashMap<String, CacheItem>) {
        let mut buckets: Vec<HashMap<String, CacheItem>> =
            (0..self.shards.len()).map(|_| HashMap::new()).collect();
        for (k, v) in items {
            let idx = self.shard_index(&k);
            buckets[idx].insert(k, v);
        }
        for (idx, bucket) in buckets.into_iter().enumerate() {
            *self.shards[idx].write() = bucket;
        }
    }

    pub fn set(&self, key: &str, value: Vec<u8>, requested_ttl_s: i64) {
        let now = now_unix();
        let item = CacheItem::new(value, requested_ttl_s, &self.policy, now);
        let idx = self.shard_index(key);
        self.shards[idx].write().insert(key.to_string(), item.clone());
        self.log(Command::Set {
            key: key.to_string(),
            item,
        });
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = now_unix();
        let idx = self.shard_index(key);
        let guard = self.shards[idx].read();
        guard
            .get(key)
            .filter(|item| !item.is_expired(now))
            .map(|item| item.value.clone())
    }

    pub fn del(&self, key: &str) {
        let idx = self.shard_index(key);
        self.shards[idx].write().remove(key);
        self.log(Command::Del {
            key: key.to_string(),
        });
    }

    #[must_use]
    pub fn exists(&self, key: &str) -> bool {
        let now = now_unix();
        let idx = self.shard_index(key);
        self.shards[idx]
            .read()
            .get(key)
            .is_some_and(|item| !item.is_expired(now))
    }

    /// Returns `(-1, true)` persistent, `(remaining, true)` live,
    /// `(0, false)` absent or expired.
    #[must_use]
    pub fn ttl(&self, key: &str) -> (i64, bool) {
        let now = now_unix();
        let idx = self.shard_index(key);
        match self.shards[idx].read().get(key) {
            Some(item) if !item.is_expired(now) => (item.ttl_remaining(now), true),
            _ => (0, false),
        }
    }

    /// `d <= 0` deletes the key; otherwise updates its expiry.
    pub fn expire(&self, key: &str, d: i64) -> CacheResult<()> {
        if d <= 0 {
            self.del(key);
            return Ok(());
        }
        let now = now_unix();
        let idx = self.shard_index(key);
        let mut guard = self.shards[idx].write();
        let item = guard
            .get_mut(key)
            .filter(|item| !item.is_expired(now))
            .ok_or(CacheError::NotFound)?;
        item.persistent = false;
        item.expires_at = now + d;
        let updated = item.clone();
        drop(guard);
        self.log(Command::Set {
            key: key.to_string(),
            item: updated,
        });
        Ok(())
    }

    pub fn persist(&self, key: &str) -> CacheResult<()> {
        let now = now_unix();
        let idx = self.shard_index(key);
        let mut guard = self.shards[idx].write();
        let item = guard
            .get_mut(key)
            .filter(|item| !item.is_expired(now))
            .ok_or(CacheError::NotFound)?;
        item.persistent = true;
        let updated = item.clone();
        drop(guard);
        self.log(Command::Set {
            key: key.to_string(),
            item: updated,
        });
        Ok(())
    }

    fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let now = now_unix();
        let idx = self.shard_index(key);
        let mut guard = self.shards[idx].write();
        let item = guard
            .get_mut(key)
            .filter(|item| !item.is_expired(now))
            .ok_or(CacheError::NotFound)?;
        let current: i64 = std::str::from_utf8(&item.value)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| CacheError::Server("value is not an integer".to_string()))?;
        let next = current + delta;
        item.value = next.to_string().into_bytes();
        let updated = item.clone();
        drop(guard);
        self.log(Command::Set {
            key: key.to_string(),
            item: updated,
        });
        Ok(next)
    }

    pub fn incr(&self, key: &str) -> CacheResult<i64> {
        self.incr_by(key, 1)
    }

    pub fn decr(&self, key: &str) -> CacheResult<i64> {
        self.incr_by(key, -1)
    }

    /// Sets `key` only if it is absent or expired. Returns whether the set
    /// happened.
    pub fn set_nx(&self, key: &str, value: Vec<u8>, requested_ttl_s: i64) -> bool {
        let now = now_unix();
        let idx = self.shard_index(key);
        let mut guard = self.shards[idx].write();
        if guard.get(key).is_some_and(|item| !item.is_expired(now)) {
            return false;
        }
        let item = CacheItem::new(value, requested_ttl_s, &self.policy, now);
        guard.insert(key.to_string(), item.clone());
        drop(guard);
        self.log(Command::Set {
            key: key.to_string(),
            item,
        });
        true
    }

    /// Overwrites `key`'s value, returning the previous value (or `None`).
    /// If the key existed and was live, its expiry is preserved; otherwise
    /// the new item gets a fresh default-TTL, non-persistent expiry.
    pub fn get_set(&self, key: &str, value: Vec<u8>) -> Vec<u8> {
        let now = now_unix();
        let idx = self.shard_index(key);
        let mut guard = self.shards[idx].write();
        let previous = guard.get(key).filter(|item| !item.is_expired(now));
        let item = if let Some(existing) = previous {
            CacheItem {
                value,
                expires_at: existing.expires_at,
                persistent: existing.persistent,
            }
        } else {
            CacheItem::new(value, 0, &self.policy, now)
        };
        let old_value = previous.map(|item| item.value.clone()).unwrap_or_default();
        guard.insert(key.to_string(), item.clone());
        drop(guard);
        self.log(Command::Set {
            key: key.to_string(),
            item,
        });
        old_value
    }

    /// All live (non-expired) keys. Locks every shard for reading in
    /// ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = now_unix();
        let mut out = Vec::new();
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            guards.push(shard.read());
        }
        for guard in &guards {
            out.extend(
                guard
                    .iter()
                    .filter(|(_, item)| !item.is_expired(now))
                    .map(|(k, _)| k.clone()),
            );
        }
        while guards.pop().is_some() {}
        out
    }

    /// Removes every key. Locks every shard for writing in ascending order.
    pub fn flush(&self) {
        let mut guards = Vec::with_capacity(self.shards.len());
        for shard in self.shards.iter() {
            guards.push(shard.write());
        }
        let mut deleted_keys = Vec::new();
        for guard in &mut guards {
            deleted_keys.extend(guard.keys().cloned());
            guard.clear();
        }
        while guards.pop().is_some() {}
        for key in deleted_keys {
            self.log(Command::Del { key });
        }
    }

    /// Reads several keys at once, locking only the distinct shards they
    /// fall in, in ascending index order.
    #[must_use]
    pub fn mget(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
        let now = now_unix();
        let mut by_shard: Vec<usize> = keys.iter().map(|k| self.shard_index(k)).collect();
        by_shard.sort_unstable();
        by_shard.dedup();

        let mut guards: Vec<(usize, _)> = by_shard
            .iter()
            .map(|&idx| (idx, self.shards[idx].read()))
            .collect();

        let mut out = HashMap::new();
        for key in keys {
            let idx = self.shard_index(key);
            if let Some((_, guard)) = guards.iter().find(|(i, _)| *i == idx) {
                if let Some(item) = guard.get(key) {
                    if !item.is_expired(now) {
                        out.insert(key.clone(), item.value.clone());
                    }
                }
            }
        }
        while guards.pop().is_some() {}
        out
    }

    /// Scans the given (already shard-index-sorted, ascending) shards for
    /// expired entries and removes them, logging a DEL per removal.
    /// Returns the number of entries removed. Used by the expiry sampler.
    pub fn expire_sample(&self, shard_indices: &[usize]) -> usize {
        let now = now_unix();
        let mut removed_keys = Vec::new();
        let mut guards: Vec<(usize, _)> = shard_indices
            .iter()
            .map(|&idx| (idx, self.shards[idx].write()))
            .collect();

        for (_, guard) in &mut guards {
            let expired: Vec<String> = guard
                .iter()
                .filter(|(_, item)| item.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                guard.remove(&key);
                removed_keys.push(key);
            }
        }
        while guards.pop().is_some() {}

        let count = removed_keys.len();
        for key in removed_keys {
            self.log(Command::Del { key });
        }
        count
    }

    /// Writes several keys at once under the same TTL policy, locking only
    /// the distinct shards involved, in ascending index order.
    pub fn mset(&self, kv: &HashMap<String, Vec<u8>>, requested_ttl_s: i64) {
        let now = now_unix();
        let mut by_shard: Vec<usize> = kv.keys().map(|k| self.shard_index(k)).collect();
        by_shard.sort_unstable();
        by_shard.dedup();

        let mut guards: Vec<(usize, _)> = by_shard
            .iter()
            .map(|&idx| (idx, self.shards[idx].write()))
            .collect();

        let mut logged = Vec::with_capacity(kv.len());
        for (key, value) in kv {
            let idx = self.shard_index(key);
            let item = CacheItem::new(value.clone(), requested_ttl_s, &self.policy, now);
            let (_, guard) = guards.iter_mut().find(|(i, _)| *i == idx).unwrap();
            guard.insert(key.clone(), item.clone());
            logged.push(Command::Set {
                key: key.clone(),
                item,
            });
        }
        while guards.pop().is_some() {}
        for cmd in logged {
            self.log(cmd);
        }
    }
}

#[cfg(test)]
impl ShardedStore {
    /// Test-only hook: forces an existing key into the expired state
    /// without going through `expire()` (which would just delete it).
    pub fn force_expire_for_test(&self, key: &str) {
        let idx = self.shard_index(key);
        if let Some(item) = self.shards[idx].write().get_mut(key) {
            item.persistent = false;
            item.expires_at = now_unix() - 10;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ShardedStore {
        ShardedStore::new(8, TtlPolicy::new(60, 3600))
    }

    #[test]
    fn set_then_get_round_trips() {
        let s = store();
        s.set("foo", b"bar".to_vec(), 5);
        assert_eq!(s.get("foo"), Some(b"bar".to_vec()));
    }

    #[test]
    fn del_removes_key() {
        let s = store();
        s.set("foo", b"bar".to_vec(), 5);
        s.del("foo");
        assert_eq!(s.get("foo"), None);
    }

    #[test]
    fn expired_item_reads_as_absent() {
        let s = store();
        s.set("foo", b"bar".to_vec(), 1);
        // Simulate expiry by writing directly with an expiry in the past.
        let idx = s.shard_index("foo");
        s.shards[idx].write().get_mut("foo").unwrap().expires_at = now_unix() - 10;
        assert_eq!(s.get("foo"), None);
        assert!(!s.exists("foo"));
    }

    #[test]
    fn negative_ttl_is_persistent() {
        let s = store();
        s.set("p", b"v".to_vec(), -1);
        assert_eq!(s.ttl("p"), (-1, true));
    }

    #[test]
    fn ttl_absent_key() {
        let s = store();
        assert_eq!(s.ttl("missing"), (0, false));
    }

    #[test]
    fn expire_with_non_positive_deletes() {
        let s = store();
        s.set("foo", b"bar".to_vec(), 10);
        s.expire("foo", 0).unwrap();
        assert_eq!(s.get("foo"), None);
    }

    #[test]
    fn expire_missing_key_is_not_found() {
        let s = store();
        assert_eq!(s.expire("missing", 5), Err(CacheError::NotFound));
    }

    #[test]
    fn persist_then_ttl_is_negative_one() {
        let s = store();
        s.set("p", b"v".to_vec(), 5);
        s.persist("p").unwrap();
        assert_eq!(s.ttl("p"), (-1, true));
    }

    #[test]
    fn incr_and_decr_round_trip() {
        let s = store();
        s.set("counter", b"1".to_vec(), 0);
        assert_eq!(s.incr("counter").unwrap(), 2);
        assert_eq!(s.decr("counter").unwrap(), 1);
    }

    #[test]
    fn incr_missing_key_is_not_found() {
        let s = store();
        assert_eq!(s.incr("missing"), Err(CacheError::NotFound));
    }

    #[test]
    fn incr_non_integer_is_server_error() {
        let s = store();
        s.set("x", b"not-a-number".to_vec(), 0);
        assert!(matches!(s.incr("x"), Err(CacheError::Server(_))));
    }

    #[test]
    fn setnx_only_succeeds_once() {
        let s = store();
        assert!(s.set_nx("nx", b"first".to_vec(), 0));
        assert!(!s.set_nx("nx", b"second".to_vec(), 0));
        assert_eq!(s.get("nx"), Some(b"first".to_vec()));
    }

    #[test]
    fn getset_preserves_ttl_of_existing_key() {
        let s = store();
        s.set("k", b"v1".to_vec(), 100);
        let (ttl_before, _) = s.ttl("k");
        let old = s.get_set("k", b"v2".to_vec());
        assert_eq!(old, b"v1".to_vec());
        let (ttl_after, live) = s.ttl("k");
        assert!(live);
        assert!(ttl_after <= ttl_before);
        assert!(ttl_after > 0);
    }

    #[test]
    fn getset_on_missing_key_returns_empty_and_creates() {
        let s = store();
        let old = s.get_set("new", b"v".to_vec());
        assert!(old.is_empty());
        assert_eq!(s.get("new"), Some(b"v".to_vec()));
    }

    #[test]
    fn mset_then_mget_returns_exact_subset() {
        let s = store();
        let mut kv = HashMap::new();
        kv.insert("a".to_string(), b"1".to_vec());
        kv.insert("b".to_string(), b"2".to_vec());
        s.mset(&kv, 0);

        let result = s.mget(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("a"), Some(&b"1".to_vec()));
        assert_eq!(result.get("b"), Some(&b"2".to_vec()));
        assert!(!result.contains_key("c"));
    }

    #[test]
    fn keys_lists_only_live_keys() {
        let s = store();
        s.set("a", b"1".to_vec(), 10);
        s.set("b", b"2".to_vec(), 10);
        let mut keys = s.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn flush_removes_everything() {
        let s = store();
        s.set("a", b"1".to_vec(), 10);
        s.set("b", b"2".to_vec(), 10);
        s.flush();
        assert!(s.keys().is_empty());
    }

    #[test]
    fn snapshot_copy_excludes_expired_items() {
        let s = store();
        s.set("live", b"1".to_vec(), 100);
        s.set("dead", b"2".to_vec(), 1);
        let idx = s.shard_index("dead");
        s.shards[idx].write().get_mut("dead").unwrap().expires_at = now_unix() - 10;

        let snap = s.snapshot_copy();
        assert!(snap.contains_key("live"));
        assert!(!snap.contains_key("dead"));
    }

    #[test]
    fn load_all_redistributes_into_correct_shards() {
        let s = store();
        let mut items = HashMap::new();
        items.insert(
            "k1".to_string(),
            CacheItem {
                value: b"v1".to_vec(),
                expires_at: now_unix() + 100,
                persistent: false,
            },
        );
        s.load_all(items);
        assert_eq!(s.get("k1"), Some(b"v1".to_vec()));
    }
}

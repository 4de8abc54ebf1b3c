//! The uniform adapter interface, plus the local and (stubbed) remote
//! backends that implement it.
//!
//! The distributor and node router only ever see `Arc<dyn Adapter>` --
//! neither cares whether a key's owner is the in-process store or a
//! network peer.

use std::collections::HashMap;

use async_trait::async_trait;
use cachegrid_core::CacheResult;

use crate::storage::ShardedStore;

/// The operation vocabulary every backend (local or remote) exposes.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn set_item(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<()>;
    async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
    async fn delete_item(&self, key: &str) -> CacheResult<()>;
    async fn list_keys(&self) -> CacheResult<Vec<String>>;
    async fn clear_cache(&self) -> CacheResult<()>;
    async fn get_ttl(&self, key: &str) -> CacheResult<(i64, bool)>;
    async fn update_expiration(&self, key: &str, ttl_s: i64) -> CacheResult<()>;
    async fn remove_expiration(&self, key: &str) -> CacheResult<()>;
    async fn increment(&self, key: &str) -> CacheResult<i64>;
    async fn decrement(&self, key: &str) -> CacheResult<i64>;
    async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<bool>;
    async fn get_and_set(&self, key: &str, value: Vec<u8>) -> CacheResult<Vec<u8>>;
    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>>;
    async fn set_multiple(&self, kv: &HashMap<String, Vec<u8>>, ttl_s: i64) -> CacheResult<()>;
}

/// Thin 1:1 delegation from the adapter vocabulary to the in-process
/// sharded store.
pub struct LocalAdapter {
    store: ShardedStore,
}

impl LocalAdapter {
    #[must_use]
    pub fn new(store: ShardedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    async fn set_item(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<()> {
        self.store.set(key, value, ttl_s);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.store.get(key))
    }

    async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.store.del(key);
        Ok(())
    }

    async fn list_keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.store.keys())
    }

    async fn clear_cache(&self) -> CacheResult<()> {
        self.store.flush();
        Ok(())
    }

    async fn get_ttl(&self, key: &str) -> CacheResult<(i64, bool)> {
        Ok(self.store.ttl(key))
    }

    async fn update_expiration(&self, key: &str, ttl_s: i64) -> CacheResult<()> {
        self.store.expire(key, ttl_s)
    }

    async fn remove_expiration(&self, key: &str) -> CacheResult<()> {
        self.store.persist(key)
    }

    async fn increment(&self, key: &str) -> CacheResult<i64> {
        self.store.incr(key)
    }

    async fn decrement(&self, key: &str) -> CacheResult<i64> {
        self.store.decr(key)
    }

    async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<bool> {
        Ok(self.store.set_nx(key, value, ttl_s))
    }

    async fn get_and_set(&self, key: &str, value: Vec<u8>) -> CacheResult<Vec<u8>> {
        Ok(self.store.get_set(key, value))
    }

    async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        Ok(self.store.mget(keys))
    }

    async fn set_multiple(&self, kv: &HashMap<String, Vec<u8>>, ttl_s: i64) -> CacheResult<()> {
        self.store.mset(kv, ttl_s);
        Ok(())
    }
}

/// A declared extension point for a network-backed adapter. Every method
/// is an unimplemented stub -- there is no remote protocol defined yet.
pub struct RemoteAdapter;

fn unimplemented() -> cachegrid_core::CacheError {
    cachegrid_core::CacheError::Server("remote adapter not implemented".to_string())
}

#[async_trait]
impl Adapter for RemoteAdapter {
    async fn set_item(&self, _key: &str, _value: Vec<u8>, _ttl_s: i64) -> CacheResult<()> {
        Err(unimplemented())
    }
    async fn get_item(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Err(unimplemented())
    }
    async fn delete_item(&self, _key: &str) -> CacheResult<()> {
        Err(unimplemented())
    }
    async fn list_keys(&self) -> CacheResult<Vec<String>> {
        Err(unimplemented())
    }
    async fn clear_cache(&self) -> CacheResult<()> {
        Err(unimplemented())
    }
    async fn get_ttl(&self, _key: &str) -> CacheResult<(i64, bool)> {
        Err(unimplemented())
    }
    async fn update_expiration(&self, _key: &str, _ttl_s: i64) -> CacheResult<()> {
        Err(unimplemented())
    }
    async fn remove_expiration(&self, _key: &str) -> CacheResult<()> {
        Err(unimplemented())
    }
    async fn increment(&self, _key: &str) -> CacheResult<i64> {
        Err(unimplemented())
    }
    async fn decrement(&self, _key: &str) -> CacheResult<i64> {
        Err(unimplemented())
    }
    async fn set_if_not_exists(&self, _key: &str, _value: Vec<u8>, _ttl_s: i64) -> CacheResult<bool> {
        Err(unimplemented())
    }
    async fn get_and_set(&self, _key: &str, _value: Vec<u8>) -> CacheResult<Vec<u8>> {
        Err(unimplemented())
    }
    async fn get_multiple(&self, _keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        Err(unimplemented())
    }
    async fn set_multiple(&self, _kv: &HashMap<String, Vec<u8>>, _ttl_s: i64) -> CacheResult<()> {
        Err(unimplemented())
    }
}

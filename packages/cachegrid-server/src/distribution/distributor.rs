//! The facade that routes adapter-vocabulary operations to the node
//! responsible for each key.
//!
//! Today the ring only ever holds the local node, so every call resolves
//! to the in-process [`LocalAdapter`](super::adapter::LocalAdapter). The
//! indirection through [`NodeRouter`] is what lets a future remote
//! adapter join the ring without changing any call site.

use std::collections::HashMap;

use cachegrid_core::{CacheError, CacheResult};

use super::ring::NodeRouter;

/// Routes cache operations to the local adapter via the node ring.
pub struct Distributor {
    router: NodeRouter,
}

impl Distributor {
    #[must_use]
    pub fn new(router: NodeRouter) -> Self {
        Self { router }
    }

    fn local(&self) -> CacheResult<std::sync::Arc<dyn super::adapter::Adapter>> {
        self.router
            .local_adapter()
            .ok_or_else(|| CacheError::Server("local adapter not configured".to_string()))
    }

    pub async fn set_item(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<()> {
        self.local()?.set_item(key, value, ttl_s).await
    }

    pub async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.local()?.get_item(key).await
    }

    pub async fn delete_item(&self, key: &str) -> CacheResult<()> {
        self.local()?.delete_item(key).await
    }

    pub async fn list_keys(&self) -> CacheResult<Vec<String>> {
        self.local()?.list_keys().await
    }

    pub async fn clear_cache(&self) -> CacheResult<()> {
        self.local()?.clear_cache().await
    }

    pub async fn get_ttl(&self, key: &str) -> CacheResult<(i64, bool)> {
        self.local()?.get_ttl(key).await
    }

    pub async fn update_expiration(&self, key: &str, ttl_s: i64) -> CacheResult<()> {
        self.local()?.update_expiration(key, ttl_s).await
    }

    pub async fn remove_expiration(&self, key: &str) -> CacheResult<()> {
        self.local()?.remove_expiration(key).await
    }

    pub async fn increment(&self, key: &str) -> CacheResult<i64> {
        self.local()?.increment(key).await
    }

    pub async fn decrement(&self, key: &str) -> CacheResult<i64> {
        self.local()?.decrement(key).await
    }

    pub async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl_s: i64) -> CacheResult<bool> {
        self.local()?.set_if_not_exists(key, value, ttl_s).await
    }

    pub async fn get_and_set(&self, key: &str, value: Vec<u8>) -> CacheResult<Vec<u8>> {
        self.local()?.get_and_set(key, value).await
    }

    pub async fn get_multiple(&self, keys: &[String]) -> CacheResult<HashMap<String, Vec<u8>>> {
        self.local()?.get_multiple(keys).await
    }

    pub async fn set_multiple(&self, kv: &HashMap<String, Vec<u8>>, ttl_s: i64) -> CacheResult<()> {
        self.local()?.set_multiple(kv, ttl_s).await
    }
}

//! The composition root: wires the sharded store, durability, the node
//! ring, and the background maintenance tasks into one owned value.

use std::sync::Arc;
use std::time::Duration;

use cachegrid_core::TtlPolicy;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::distribution::ring::LOCAL_NODE_ID;
use crate::distribution::{Distributor, LocalAdapter, NodeRouter};
use crate::durability::PersistentCoordinator;
use crate::storage::{sampler, ShardedStore};

/// Owns every stateful subsystem of a running cache node.
pub struct Engine {
    store: ShardedStore,
    coordinator: Option<Arc<PersistentCoordinator>>,
    distributor: Arc<Distributor>,
    sampler_handle: JoinHandle<()>,
    snapshot_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Builds the engine from configuration, recovering from durable
    /// storage first if it's enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if durability is enabled and the AOF/SNAP files
    /// exist but cannot be parsed.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let policy = TtlPolicy::new(config.ttl.default, config.ttl.max);

        let coordinator = if config.persistent.is_enabled() {
            let dir = std::path::Path::new(&config.persistent.path);
            std::fs::create_dir_all(dir)?;
            Some(Arc::new(PersistentCoordinator::start(dir)))
        } else {
            None
        };

        let mut store = ShardedStore::new(config.server.shard_count, policy);
        if let Some(coordinator) = &coordinator {
            let recovered = coordinator.load()?;
            let count = recovered.len();
            store.load_all(recovered);
            store = store.with_durability(Arc::clone(coordinator));
            info!(recovered = count, "recovered cache state from durable storage");
        }

        let router = NodeRouter::new(config.server.virtual_replicas, 0);
        router.add_adapter(LOCAL_NODE_ID, Arc::new(LocalAdapter::new(store.clone())));
        let distributor = Arc::new(Distributor::new(router));

        let sampler_handle = sampler::spawn(
            store.clone(),
            Duration::from_millis(config.server.sample_interval_ms),
            config.server.sample_shards_per_tick,
        );

        let snapshot_handle = coordinator.clone().map(|coordinator| {
            let store = store.clone();
            let interval = Duration::from_millis(config.server.snapshot_interval_ms);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    coordinator.trigger_snap(|| store.snapshot_copy()).await;
                }
            })
        });

        Ok(Self {
            store,
            coordinator,
            distributor,
            sampler_handle,
            snapshot_handle,
        })
    }

    /// The distributor, shared with the HTTP surface.
    #[must_use]
    pub fn distributor(&self) -> Arc<Distributor> {
        Arc::clone(&self.distributor)
    }

    /// Stops background tasks and closes durable storage, flushing any
    /// buffered writes.
    pub async fn close(self) {
        self.sampler_handle.abort();
        if let Some(handle) = self.snapshot_handle {
            handle.abort();
        }
        drop(self.store);
        drop(self.distributor);
        if let Some(coordinator) = self.coordinator {
            match Arc::try_unwrap(coordinator) {
                Ok(coordinator) => coordinator.close().await,
                Err(_) => {
                    tracing::warn!("durability coordinator still has outstanding references at shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_only_engine_starts_and_closes() {
        let config = AppConfig::default();
        let engine = Engine::new(&config).await.unwrap();
        let distributor = engine.distributor();
        distributor.set_item("k", b"v".to_vec(), 0).await.unwrap();
        assert_eq!(distributor.get_item("k").await.unwrap(), Some(b"v".to_vec()));
        engine.close().await;
    }

    #[tokio::test]
    async fn durable_engine_recovers_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.persistent.kind = "file".to_string();
        config.persistent.path = dir.path().to_string_lossy().into_owned();

        let engine = Engine::new(&config).await.unwrap();
        engine
            .distributor()
            .set_item("a", b"1".to_vec(), 0)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.close().await;

        let engine = Engine::new(&config).await.unwrap();
        assert_eq!(
            engine.distributor().get_item("a").await.unwrap(),
            Some(b"1".to_vec())
        );
        engine.close().await;
    }
}

//! Typed application configuration, loaded from YAML with `CACHE_`-prefixed
//! environment variable overrides.

use serde::Deserialize;

/// Top-level configuration for a cache server process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub persistent: PersistentConfig,
    pub ttl: TtlConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            persistent: PersistentConfig::default(),
            ttl: TtlConfig::default(),
            http: HttpConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Selects whether and where durable storage is enabled.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    /// `"file"` to enable AOF/SNAP durability, `"none"` to run memory-only.
    pub kind: String,
    /// Directory holding `cache.aof`/`cache.snap` and their scratch files.
    pub path: String,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            kind: "none".to_string(),
            path: "./data".to_string(),
        }
    }
}

impl PersistentConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.kind == "file"
    }
}

/// Default and maximum time-to-live applied to writes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Seconds applied when a request supplies `ttl == 0`.
    pub default: i64,
    /// Seconds a requested TTL is clamped to when it exceeds this ceiling.
    pub max: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default: 300,
            max: 86_400,
        }
    }
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "0.0.0.0:7878".to_string(),
        }
    }
}

/// Node identity and tunables for sharding, the hash ring, and background
/// maintenance tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub node_id: String,
    pub shard_count: usize,
    pub virtual_replicas: usize,
    pub sample_interval_ms: u64,
    pub sample_shards_per_tick: usize,
    pub snapshot_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: "local-node".to_string(),
            shard_count: 256,
            virtual_replicas: 3,
            sample_interval_ms: 1_000,
            sample_shards_per_tick: 20,
            snapshot_interval_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path` (if it exists) layered under
    /// `CACHE_`-prefixed environment variable overrides, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` exists but contains invalid YAML, or if
    /// an environment override cannot be coerced into its field's type.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CACHE").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert!(!config.persistent.is_enabled());
        assert_eq!(config.ttl.default, 300);
        assert_eq!(config.server.shard_count, 256);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does-not-exist.yaml").unwrap();
        assert_eq!(config.server.node_id, "local-node");
    }
}

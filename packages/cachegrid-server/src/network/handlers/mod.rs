//! HTTP handler definitions for the cache server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod cache;
pub mod health;

pub use cache::{
    decr_handler, del_handler, exists_handler, expire_handler, flush_handler, get_handler,
    getset_handler, incr_handler, keys_handler, mget_handler, mset_handler, persist_handler,
    ping_handler, set_handler, setnx_handler, ttl_handler,
};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use crate::distribution::Distributor;

use super::{NetworkConfig, ShutdownController};

/// Shared application state passed to all axum handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    /// Routes cache operations to the node responsible for a key.
    pub distributor: Arc<Distributor>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, CORS, timeouts).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

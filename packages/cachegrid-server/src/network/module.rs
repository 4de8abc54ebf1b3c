//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation allows the rest of the application to
//! configure shared state (e.g., the engine) between `start()` and
//! `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::distribution::Distributor;

use super::config::NetworkConfig;
use super::handlers::{
    decr_handler, del_handler, exists_handler, expire_handler, flush_handler, get_handler,
    getset_handler, health_handler, incr_handler, keys_handler, liveness_handler, mget_handler,
    mset_handler, persist_handler, ping_handler, readiness_handler, set_handler, setnx_handler,
    ttl_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;

/// Manages the full HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates shared state (shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    distributor: Arc<Distributor>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, distributor: Arc<Distributor>) -> Self {
        Self {
            config,
            listener: None,
            distributor,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the shutdown controller.
    ///
    /// Other modules use this to check health state or trigger shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    fn state(&self) -> AppState {
        AppState {
            distributor: Arc::clone(&self.distributor),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        }
    }

    fn router(&self, metrics_handle: metrics_exporter_prometheus::PrometheusHandle) -> Router {
        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/metrics", get(move || async move { metrics_handle.render() }))
            .route("/ping", get(ping_handler))
            .route("/get", get(get_handler))
            .route("/exists", get(exists_handler))
            .route("/keys", get(keys_handler))
            .route("/ttl", get(ttl_handler))
            .route("/set", post(set_handler))
            .route("/flush", post(flush_handler))
            .route("/expire", post(expire_handler))
            .route("/persist", post(persist_handler))
            .route("/incr", post(incr_handler))
            .route("/decr", post(decr_handler))
            .route("/setnx", post(setnx_handler))
            .route("/getset", post(getset_handler))
            .route("/mget", post(mget_handler))
            .route("/mset", post(mset_handler))
            .route("/del", delete(del_handler))
            .layer(layers)
            .with_state(self.state())
    }

    /// Assembles the axum router with all routes and middleware, using a
    /// fresh Prometheus recorder. Intended for tests and ad hoc inspection;
    /// `serve()` builds its own router sharing the installed global recorder.
    #[must_use]
    pub fn build_router(&self) -> Router {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        self.router(handle)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving connections until the shutdown signal fires.
    ///
    /// Consumes `self` because the listener is moved into the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let shutdown_ctrl = Arc::clone(&self.shutdown);
        let router = self.router(metrics_handle);

        shutdown_ctrl.set_ready();

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        drain(&shutdown_ctrl).await;
        Ok(())
    }
}

/// Transitions to Draining and waits for in-flight requests to complete.
async fn drain(shutdown_ctrl: &ShutdownController) {
    shutdown_ctrl.trigger_shutdown();
    let drained = shutdown_ctrl.wait_for_drain(Duration::from_secs(30)).await;
    if drained {
        info!("All in-flight requests drained successfully");
    } else {
        warn!("Drain timeout expired with in-flight requests remaining");
    }
}

//! Cache server entrypoint: loads configuration, builds the engine, binds
//! the HTTP surface, and serves until a shutdown signal arrives.

use cachegrid_server::network::{NetworkConfig, NetworkModule};
use cachegrid_server::{AppConfig, Engine};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cachegrid-server")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "CACHE_CONFIG", default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let engine = Engine::new(&config).await?;
    let distributor = engine.distributor();

    let network_config = NetworkConfig {
        host: config
            .http
            .address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| config.http.address.clone()),
        port: config
            .http
            .address
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse().ok())
            .unwrap_or(7878),
        ..NetworkConfig::default()
    };

    let mut module = NetworkModule::new(network_config, distributor);
    module.start().await?;

    tracing::info!("cachegrid-server ready");
    module.serve(metrics_handle, shutdown_signal()).await?;

    engine.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}

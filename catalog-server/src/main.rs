use anyhow::Result;
use catalog_api::{
    app,
    observability::{build_metrics_sink, init_logging, TelemetryState},
    AppState,
};
use catalog_storage::{InMemoryProductStore, InstrumentedStore};
use catalog_telemetry::{CountingAllocator, Masker, TelemetryRegistry};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod config;

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::load()?;
    init_logging(&config.logging)?;

    info!("Starting catalog server");

    let registry = Arc::new(TelemetryRegistry::new(build_metrics_sink(&config.metrics)));
    let masker = Arc::new(Masker::with_extra_patterns(&config.masking.extra_patterns));
    info!(patterns = masker.patterns().len(), "Masking patterns loaded");

    let store = InstrumentedStore::new(
        InMemoryProductStore::new(),
        registry.clone(),
        config.slow_operations,
    );

    let telemetry = TelemetryState::new(masker, registry, config.inventory)
        .with_excluded_paths(config.metrics.excluded_paths.iter().cloned());

    let state = AppState {
        store: Arc::new(store),
        telemetry,
    };

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Catalog server shutdown complete");

    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown"),
            Err(e) => error!(error = %e, "Failed to listen for SIGINT"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown");
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

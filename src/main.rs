//! Yacht Cache - reference host process
//!
//! Wires the cache, prober and mode coordinator together and serves the
//! HTTP surface the rest of the assistant talks to.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yacht_cache::api::create_router;
use yacht_cache::{
    spawn_probe_task, AppState, CacheStore, Config, ConnectivityProber, MetricsAggregator,
    ModeCoordinator, Telemetry, TelemetrySink,
};

/// Main entry point for the cache host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Start the telemetry drain task
/// 4. Open the configured storage backend (fatal on failure)
/// 5. Start the periodic connectivity probe
/// 6. Serve the HTTP surface on the configured port
/// 7. On SIGINT/SIGTERM stop probing, flush the cache and drain telemetry
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yacht_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Yacht Cache");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        storage = ?config.storage,
        services = config.probe_services.len(),
        probe_timeout_ms = config.probe_timeout.as_millis() as u64,
        probe_interval = config.probe_interval,
        port = config.server_port,
        "Configuration loaded"
    );

    let sink = match &config.telemetry_url {
        Some(url) => TelemetrySink::http(url.clone(), config.probe_timeout)
            .context("telemetry client could not be built")?,
        None => TelemetrySink::Log,
    };
    let (telemetry, telemetry_handle) = Telemetry::spawn(sink);

    let metrics = Arc::new(MetricsAggregator::new());
    let coordinator = Arc::new(ModeCoordinator::new(metrics.clone(), telemetry.clone()));

    let cache = match CacheStore::open(&config.storage, coordinator.clone(), metrics, telemetry).await {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            error!(error = %e, "Cache storage could not be initialized, refusing to start");
            return Err(e).context("cache storage initialization failed");
        }
    };
    info!(backend = cache.backend_name(), "Cache store initialized");

    let prober = Arc::new(
        ConnectivityProber::new(config.probe_services.clone(), config.probe_timeout)
            .context("failed to build connectivity prober")?,
    );
    let probe_handle = spawn_probe_task(prober.clone(), coordinator, config.probe_interval);
    info!("Background probe task started");

    let app = create_router(AppState::new(cache.clone(), prober));

    // Bind to configured port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(probe_handle))
        .await
        .context("server error")?;

    // Flush the local cache file before exiting
    cache.close().await;

    // The router (and its telemetry clones) is gone; give the sink a moment to drain.
    drop(cache);
    if tokio::time::timeout(Duration::from_secs(2), telemetry_handle)
        .await
        .is_err()
    {
        warn!("Telemetry queue not drained before shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the probe task and allows graceful shutdown.
async fn shutdown_signal(probe_handle: JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    // Abort the probe task
    probe_handle.abort();
    warn!("Probe task aborted");
}

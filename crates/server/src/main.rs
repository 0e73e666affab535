use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidrelay_core::{
    load_config, validate_config, AllowList, ArtifactCache, FfmpegTranscoder, LocalTransport,
    PipelineCoordinator, RateLimiter, SqliteArtifactCache, SubmissionService,
};
use vidrelay_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How often idle rate limiter entries are dropped
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("VIDRELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Broadcast destination: {}", config.broadcast.destination());
    info!("Cache path: {:?}", config.cache.path);

    for dir in [
        &config.paths.work_dir,
        &config.paths.inbox_dir,
        &config.paths.outbox_dir,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    // Create artifact cache
    let cache: Arc<dyn ArtifactCache> = Arc::new(
        SqliteArtifactCache::new(&config.cache.path).context("Failed to open artifact cache")?,
    );
    info!(
        entries = cache.len().unwrap_or(0),
        "Artifact cache initialized"
    );

    let transport = Arc::new(LocalTransport::new(config.transport_config()));
    let transcoder = Arc::new(FfmpegTranscoder::new(config.transcoder.clone()));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

    let coordinator = PipelineCoordinator::new(
        config.coordinator_config(),
        transport,
        transcoder,
        cache,
    )
    .with_rate_limiter(Arc::clone(&limiter))
    .with_progress_config(config.progress.clone());
    info!("Pipeline coordinator ready");

    // Periodically forget destinations that have been idle for a while
    let cleanup_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            let removed = limiter.cleanup().await;
            if removed > 0 {
                debug!(removed, "Dropped idle rate limiter entries");
            }
        }
    });

    let allow_list = AllowList::load(&config.access)
        .await
        .context("Failed to load allow list")?;
    if allow_list.is_empty().await {
        info!("Allow list is empty, every submitter is admitted");
    } else {
        info!(entries = allow_list.len().await, "Allow list loaded");
    }

    // Create app state
    let service: Arc<dyn SubmissionService> = Arc::new(coordinator.clone());
    let state = Arc::new(AppState::with_allow_list(
        config.clone(),
        service,
        allow_list,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    cleanup_handle.abort();

    // Let pending notice retractions and work directory cleanups finish
    coordinator.drain_background().await;
    info!("Background tasks finished");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

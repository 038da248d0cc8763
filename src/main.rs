//! S3 Cache Proxy - a read-through caching proxy for S3 objects
//!
//! Serves objects from a disk-backed LRU cache and downloads misses from the
//! bucket's home region.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use s3_cache_proxy::api::{create_router_with_timeout, AppState};
use s3_cache_proxy::backend::{RegionAwareFetcher, S3ObjectStore};
use s3_cache_proxy::cache::DiskCache;
use s3_cache_proxy::{Config, RequestCoordinator};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the disk cache, restoring entries from its metadata
/// 4. Build the S3 client and the region-aware fetcher
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "s3_cache_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting S3 Cache Proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_dir={}, max_size={}GB, region={}, port={}, fetch_timeout={}s, request_timeout={}s",
        config.cache_dir.display(),
        config.max_size_gb,
        config.aws_region,
        config.server_port,
        config.fetch_timeout_secs,
        config.request_timeout_secs
    );

    let cache = DiskCache::open(&config.cache_dir, config.max_size_bytes())
        .with_context(|| format!("failed to open cache at {}", config.cache_dir.display()))?;
    info!(entries = cache.len().await, "Disk cache initialized");

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await;
    let fetcher = RegionAwareFetcher::new(S3ObjectStore::new(sdk_config));

    let coordinator = RequestCoordinator::new(Arc::new(cache), Arc::new(fetcher), config.fetch_timeout());
    let app = create_router_with_timeout(AppState::new(coordinator), config.request_timeout());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight downloads are dropped with their requests; committed cache
/// state is already on disk.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}

//! # leafseg-server
//!
//! An HTTP front end for store-backed leaf-segment ID allocation, built on
//! [`leafseg`].
//!
//! Each business tag owns a row in the segments table; the service keeps a
//! double-buffered range cache per tag and serves individual IDs out of it,
//! so the store sees one transactional write per `step` IDs.
//!
//! ## Endpoints
//!
//! - `GET /alloc?biz_tag=<tag>` → `{"err_no":0,"msg":"success","id":N}`
//! - `GET /health?biz_tag=<tag>` → `{"err_no":0,"msg":"success","left":N}`
//!
//! Failures answer HTTP 500 with `err_no = -1` and the error text in `msg`.
//!
//! ## Running
//!
//! ```bash
//! leafseg-server --config ./allocate.json
//! ```
//!
//! The configuration file is JSON; see [`server::config::ServiceConfig`]
//! for the recognized keys. Logging is adjustable with `RUST_LOG`.

mod server;

use anyhow::Context;
use clap::Parser;
use leafseg::{Composer, IdAllocator, SqliteSegmentStore, WallClock};
use server::config::{CliArgs, ServiceConfig};
use server::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;

    // Bootstrap order: config, then store, then the allocation facade, then
    // the transport. Each stage only exists once the previous one did.
    let store = SqliteSegmentStore::open(&config.dsn, &config.table)
        .with_context(|| format!("opening segment store at {}", config.dsn))?;
    store.ensure_schema().context("ensuring segments schema")?;

    let composer = Composer::new(WallClock, config.compose_clock);
    let alloc = Arc::new(IdAllocator::new(Arc::new(store), composer));
    let app = server::router(AppState::new(alloc), &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, table = %config.table, "segment allocation service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("service shut down");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM. Buffered segments are deliberately
/// abandoned at shutdown; their unconsumed IDs are skipped for good.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

//! Congressional Coalition Tracker web server (cct-web)
//!
//! Serves the dashboard and JSON API, and keeps the analysis cache warm with
//! an in-process refresh scheduler.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cct_common::cache::{AnalysisCache, CacheTtls};
use cct_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use cct_common::db::init::init_database;
use cct_common::refresh::Refresher;
use cct_web::{build_router, AppState};

/// Command-line arguments for cct-web
#[derive(Parser, Debug)]
#[command(name = "cct-web")]
#[command(about = "Congressional Coalition Tracker dashboard and API")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "CCT_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(short, long, env = "CCT_BIND_ADDRESS")]
    bind: Option<String>,

    /// Root folder holding the database
    #[arg(short, long, env = "CCT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (overrides <root>/cct.db)
    #[arg(long, env = "CCT_DATABASE")]
    database: Option<PathBuf>,

    /// Disable the in-process refresh scheduler
    #[arg(long)]
    no_refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting cct-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new("cct-web")
        .with_cli_arg(args.root_folder)
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;

    let db_path = args.database.unwrap_or_else(|| initializer.database_path());
    info!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let ttls = CacheTtls::from(&config.cache);
    info!(
        "Analysis cache TTL {}s, bills TTL {}s",
        ttls.analysis.as_secs(),
        ttls.bills.as_secs()
    );
    let cache = AnalysisCache::new(pool.clone(), ttls);

    let cancel = CancellationToken::new();
    let scheduler = if args.no_refresh || config.cache.refresh_interval_secs == 0 {
        info!("Refresh scheduler disabled");
        None
    } else {
        let targets = config.cache.targets();
        if targets.is_empty() {
            warn!("No valid refresh targets configured; scheduler not started");
            None
        } else {
            let refresher = Refresher::new(pool.clone(), cache.clone());
            let interval = Duration::from_secs(config.cache.refresh_interval_secs);
            Some(tokio::spawn(refresher.run_periodic(targets, interval, cancel.clone())))
        }
    };

    let state = AppState::new(pool, cache, config.server.default_congress);
    let app = build_router(state);

    let bind = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cancel.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("Refresh scheduler ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}

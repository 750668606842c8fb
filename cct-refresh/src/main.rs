//! Congressional Coalition Tracker cache refresher (cct-refresh)
//!
//! Recomputes cached analysis reports outside the web server, for hosts that
//! schedule the job with cron or a systemd timer. Runs one pass by default;
//! `--interval-secs` keeps it running until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cct_common::analysis::Chamber;
use cct_common::cache::{AnalysisCache, CacheTtls};
use cct_common::config::{RefreshTarget, RootFolderInitializer, RootFolderResolver, TomlConfig};
use cct_common::db::init::init_database;
use cct_common::refresh::Refresher;
use cct_common::time::{convened_congress_start, today};

/// Command-line arguments for cct-refresh
#[derive(Parser, Debug)]
#[command(name = "cct-refresh")]
#[command(about = "Recompute cached Congressional Coalition Tracker analyses")]
#[command(version)]
struct Args {
    /// Congress to refresh (defaults to the configured refresh targets)
    #[arg(long)]
    congress: Option<u32>,

    /// Chamber to refresh together with --congress
    #[arg(long, default_value = "house")]
    chamber: String,

    /// Run a single pass and exit (default)
    #[arg(long, conflicts_with = "interval_secs")]
    once: bool,

    /// Keep running, refreshing every N seconds
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Root folder holding the database
    #[arg(short, long, env = "CCT_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (overrides <root>/cct.db)
    #[arg(long, env = "CCT_DATABASE")]
    database: Option<PathBuf>,
}

/// Targets from the command line, or the configured list
fn resolve_targets(congress: Option<u32>, chamber: &str, config: &TomlConfig) -> Result<Vec<RefreshTarget>> {
    let chamber: Chamber = chamber.parse()?;
    let targets = match congress {
        Some(0) => bail!("Congress must be positive"),
        Some(congress) => {
            convened_congress_start(congress, today())?;
            vec![RefreshTarget { congress, chamber }]
        }
        None => config.cache.targets(),
    };
    if targets.is_empty() {
        bail!("No refresh targets: pass --congress or set cache.refresh_targets");
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
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
        "Starting cct-refresh v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let targets = resolve_targets(args.congress, &args.chamber, &config)?;

    let root_folder = RootFolderResolver::new("cct-refresh")
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

    let cache = AnalysisCache::new(pool.clone(), CacheTtls::from(&config.cache));
    let refresher = Refresher::new(pool, cache);

    let interval = if args.once { None } else { args.interval_secs };
    match interval {
        Some(0) => bail!("--interval-secs must be positive"),
        Some(secs) => {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(refresher.run_periodic(targets, Duration::from_secs(secs), cancel.clone()));

            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
            } else {
                info!("Received Ctrl+C, stopping");
            }
            cancel.cancel();
            handle.await.context("Refresh scheduler panicked")?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let reports = refresher.refresh_all(&targets).await;
            let failed: Vec<String> = reports
                .iter()
                .filter(|r| !r.succeeded())
                .map(|r| format!("{}:{}", r.congress, r.chamber))
                .collect();

            if failed.is_empty() {
                info!("Refreshed {} target(s)", reports.len());
                Ok(ExitCode::SUCCESS)
            } else {
                error!("Refresh failed for {}", failed.join(", "));
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

//! cvr-consolidate - Vote record consolidation
//!
//! Loads the existing store and this run's inputs, runs the consolidator off
//! the async runtime, and publishes the new store only when the run succeeds.
//! Ctrl+C cancels the run before anything is written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cvr_common::config::{default_config_path, write_toml_config, LoggingConfig};
use cvr_common::models::{AnchorCandidates, MeetingCatalog, RawVoteObservation};
use cvr_common::store;
use cvr_consolidate::config::{load_config, resolve_run_paths, CvrConfig, PathOverrides};
use cvr_consolidate::{ConsolidationInput, ConsolidationMode, Consolidator};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for cvr-consolidate
#[derive(Parser, Debug)]
#[command(name = "cvr-consolidate")]
#[command(about = "Consolidate council vote observations into canonical records")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "CVR_CONFIG")]
    config: Option<PathBuf>,

    /// Consolidated store (read, then replaced)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// JSON array of raw vote observations
    #[arg(short, long)]
    observations: Option<PathBuf>,

    /// JSON anchor candidates per meeting
    #[arg(short, long)]
    anchors: Option<PathBuf>,

    /// JSON meeting catalog (dates and titles)
    #[arg(long)]
    meetings: Option<PathBuf>,

    /// Rebuild everything, or only partitions touched by new observations
    #[arg(short, long, value_enum, default_value_t = ConsolidationMode::Full)]
    mode: ConsolidationMode,

    /// Run and report without writing the store
    #[arg(long)]
    dry_run: bool,

    /// Keep a timestamped copy of the prior store before replacing it
    #[arg(long)]
    backup: bool,

    /// Write the JSON run report here
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Write a config file with every default and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config(args.config.as_deref()).context("Failed to load config")?;
    init_tracing(&loaded.config.logging)?;

    info!("Starting cvr-consolidate {}", env!("CARGO_PKG_VERSION"));
    match &loaded.source {
        Some(path) => info!("Config: {}", path.display()),
        None => info!("Config: compiled defaults"),
    }

    if args.write_default_config {
        let path = args
            .config
            .clone()
            .or_else(default_config_path)
            .context("No config location available on this platform")?;
        write_toml_config(&CvrConfig::default(), &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Default config written to {}", path.display());
        return Ok(());
    }

    let paths = resolve_run_paths(
        &loaded.config.paths,
        PathOverrides {
            store: args.store.as_deref(),
            observations: args.observations.as_deref(),
            anchors: args.anchors.as_deref(),
            meetings: args.meetings.as_deref(),
            report: args.report.as_deref(),
        },
    );

    // Step 1: Load existing store and this run's inputs
    let existing = store::load_store(&paths.store)
        .with_context(|| format!("Failed to load store {}", paths.store.display()))?;
    let input = ConsolidationInput {
        observations: load_optional::<Vec<RawVoteObservation>>(paths.observations.as_deref())?,
        anchors: load_optional::<AnchorCandidates>(paths.anchors.as_deref())?,
        meetings: load_optional::<MeetingCatalog>(paths.meetings.as_deref())?,
    };
    if paths.observations.is_none() {
        warn!("No observations file given; re-consolidating the archive only");
    }

    // Step 2: Consolidate on a blocking thread, cancellable with Ctrl+C
    let consolidator = Consolidator::new(loaded.config.policy.clone());
    let cancel = CancellationToken::new();
    let existing = Arc::new(existing);

    let mut task = {
        let existing = Arc::clone(&existing);
        let cancel = cancel.clone();
        let mode = args.mode;
        tokio::task::spawn_blocking(move || {
            consolidator.consolidate_with_cancel(&existing, input, mode, &cancel)
        })
    };

    let finished = tokio::select! {
        joined = &mut task => Some(joined),
        _ = shutdown_signal() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            info!("Received Ctrl+C, cancelling consolidation");
            cancel.cancel();
            task.await
        }
    };
    let outcome = joined
        .context("Consolidation task panicked")?
        .context("Consolidation failed; store left unchanged")?;

    for issue in &outcome.report.issues {
        warn!("{}", issue);
    }

    // Step 3: Publish
    if args.dry_run {
        info!("Dry run: store not written");
    } else {
        if args.backup {
            if let Some(backup) = store::backup_store(&paths.store)
                .with_context(|| format!("Failed to back up {}", paths.store.display()))?
            {
                info!("Backup: {}", backup.display());
            }
        }
        store::save_store(&paths.store, &outcome.store)
            .with_context(|| format!("Failed to write store {}", paths.store.display()))?;
        info!(
            records = outcome.store.votes.len(),
            meetings = outcome.store.meetings.len(),
            "Store written to {}",
            paths.store.display()
        );
    }

    if let Some(report_path) = &paths.report {
        store::write_json(report_path, &outcome.report)
            .with_context(|| format!("Failed to write report {}", report_path.display()))?;
        info!("Report written to {}", report_path.display());
    }

    info!("{}", outcome.report.display_string());
    Ok(())
}

/// Initialize tracing: `RUST_LOG` if set, else the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Load a JSON input file, or its default when no path is configured
fn load_optional<T>(path: Option<&Path>) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match path {
        Some(path) => store::load_json(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => Ok(T::default()),
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

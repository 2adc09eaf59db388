//! breachwatch Entry Point
//!
//! Loads configuration, initializes telemetry, opens the LMDB store and
//! dispatches one subcommand.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use breachwatch_cli::commands;
use breachwatch_cli::telemetry::{init_tracing, render_metrics, PrometheusSink};
use breachwatch_cli::{CliConfig, CliResult};
use breachwatch_ingest::IngestionPipeline;
use breachwatch_storage::{LmdbBreachStore, LookupCache};
use clap::{Parser, Subcommand};

/// Breach identifier lookup and dump ingestion.
#[derive(Parser, Debug)]
#[command(name = "breachwatch", version)]
#[command(about = "Check identifiers against known breaches and ingest new breach dumps")]
struct Args {
    /// LMDB store directory (overrides BREACHWATCH_STORE_PATH)
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Upserts per bulk request (overrides BREACHWATCH_BATCH_SIZE)
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true, default_value = "false")]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up identifiers; prints one JSON line per identifier
    Check {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Extract identifiers from dump files and merge them under a breach tag
    Ingest {
        /// Breach label to add to every extracted identifier
        #[arg(short, long)]
        tag: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List every known breach tag
    Breaches,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    let args = Args::parse();

    let config = CliConfig::from_env()?.with_overrides(args.store_path, args.batch_size)?;
    init_tracing(config.log_format)?;

    let metrics = Arc::new(PrometheusSink::global()?);
    let store = Arc::new(LmdbBreachStore::from_config(&config.breach)?);
    tracing::info!(
        store_path = %config.breach.store_path.display(),
        cache_capacity = config.breach.cache_capacity(),
        batch_size = config.breach.batch_size,
        "breachwatch starting"
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = match args.command {
        Command::Check { identifiers } => {
            let cache = LookupCache::from_config(store.clone(), &config.breach, metrics);
            commands::check(&cache, &identifiers, &mut out).await.map(|_| ())
        }
        Command::Ingest { tag, files } => {
            let pipeline = IngestionPipeline::from_config(store.clone(), &config.breach, metrics);
            commands::ingest(&pipeline, &files, &tag, &mut out)
                .await
                .map(|_| ())
        }
        Command::Breaches => commands::breaches(store.as_ref(), &mut out)
            .await
            .map(|_| ()),
    };

    let result = commands::finish(store.as_ref(), result).await;

    if args.print_metrics {
        let text = render_metrics()?;
        std::io::stderr().write_all(text.as_bytes())?;
    }

    result
}

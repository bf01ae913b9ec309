mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{cmd_check, cmd_cycle_db, cmd_nutrition, cmd_tactical};
use crate::config::Config;
use healthsync_core::merge::MergeComparison;
use healthsync_core::service::SyncService;
use healthsync_core::workbook::CsvWorkbook;

#[derive(Parser)]
#[command(
    name = "healthsync",
    version,
    about = "Sync food logs, nutrition totals and cycle phases between spreadsheet tabs"
)]
struct Cli {
    /// Workbook root directory (one folder per spreadsheet, one CSV per tab)
    #[arg(long, global = true, env = "HEALTHSYNC_ROOT")]
    root: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the food log, write nutrition back and merge daily totals into the master table
    Nutrition {
        /// Compute and report without writing
        #[arg(long)]
        dry_run: bool,
        /// Fields that decide whether a stored day changed: kcal or all
        #[arg(long)]
        compare: Option<MergeComparison>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the tactical tab from the master table and activity log
    Tactical {
        /// Compute and report without writing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Combine every "Cycle N" tab into one table
    CycleDb {
        /// Destination tab (default: CYCLE_DEST_TAB or "DB")
        #[arg(long)]
        tab: Option<String>,
        /// Also save the combined table to this CSV file
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Compute and report without writing the destination tab
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and show what each command would touch
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("HEALTHSYNC_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string())
    };
    let env_filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn service(config: &Config) -> SyncService<CsvWorkbook> {
    SyncService::new(CsvWorkbook::new(&config.root), config.sync.clone())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.root)?;
    tracing::debug!(
        env = %config.sync.env_name,
        root = %config.root.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Nutrition {
            dry_run,
            compare,
            json,
        } => cmd_nutrition(&mut service(&config), dry_run, compare, json),
        Commands::Tactical { dry_run, json } => cmd_tactical(&mut service(&config), dry_run, json),
        Commands::CycleDb {
            tab,
            snapshot,
            dry_run,
            json,
        } => cmd_cycle_db(&mut service(&config), tab, snapshot, dry_run, json),
        Commands::Check { json } => cmd_check(&config, json),
    }
}

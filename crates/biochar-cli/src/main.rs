//! biochar - lifecycle ledger inspection and audit
//!
//! Operator CLI over a biochar lifecycle store: initialize the database,
//! inspect crops, kiln pools, inventories, batches and the movement
//! journal, and run the conservation audit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use biochar_core::{LedgerConfig, LifecycleCoordinator};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// Configuration file read when `--config` is not given, if present.
const DEFAULT_CONFIG_FILE: &str = "biochar.toml";

/// biochar - lifecycle ledger inspection and audit
#[derive(Parser, Debug)]
#[command(name = "biochar")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the ledger configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter`
    /// directive); overrides the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database (or apply the schema to an existing one)
    Init,

    /// Show a crop, its stage history and whether it can advance
    Crop {
        /// Crop id
        crop_id: String,
    },

    /// Show every biomass pool at a kiln
    Pools {
        /// Kiln id
        kiln_id: String,
    },

    /// Show a kiln's biochar inventory
    Inventory {
        /// Kiln id
        kiln_id: String,
    },

    /// List a kiln's production batches, newest first
    Batches {
        /// Kiln id
        kiln_id: String,
    },

    /// List crops on their way to a kiln awaiting verification
    Pending {
        /// Kiln id
        kiln_id: String,
    },

    /// Show a kiln's pool and inventory movements
    Journal {
        /// Kiln id
        kiln_id: String,
    },

    /// Recompute every balance from the journal and report disagreements
    Audit,
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    match path {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            LedgerConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("failed to load {DEFAULT_CONFIG_FILE}"))
        },
        None => Ok(LedgerConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    debug!(path = %config.store.path.display(), wal = config.store.wal, "opening lifecycle store");
    let coordinator = LifecycleCoordinator::open(&config.store).with_context(|| {
        format!(
            "failed to open lifecycle store at {}",
            config.store.path.display()
        )
    })?;

    let exit_code = match &cli.command {
        Commands::Init => commands::init::run_init(&coordinator, cli.json),
        Commands::Crop { crop_id } => commands::inspect::run_crop(&coordinator, crop_id, cli.json),
        Commands::Pools { kiln_id } => commands::inspect::run_pools(&coordinator, kiln_id, cli.json),
        Commands::Inventory { kiln_id } => {
            commands::inspect::run_inventory(&coordinator, kiln_id, cli.json)
        },
        Commands::Batches { kiln_id } => {
            commands::inspect::run_batches(&coordinator, kiln_id, cli.json)
        },
        Commands::Pending { kiln_id } => {
            commands::inspect::run_pending(&coordinator, kiln_id, cli.json)
        },
        Commands::Journal { kiln_id } => {
            commands::inspect::run_journal(&coordinator, kiln_id, cli.json)
        },
        Commands::Audit => commands::audit::run_audit(&coordinator, cli.json),
    };

    if exit_code != commands::exit_codes::SUCCESS {
        // Bypass anyhow so the command's exit code reaches the shell
        std::process::exit(i32::from(exit_code));
    }
    Ok(())
}

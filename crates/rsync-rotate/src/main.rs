//! # rsync-rotate
//! Rotation backups using rsync.
//!

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use chrono::Local;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use rotation::Tier;
use rsync_rotate::{
    Config, Context, LoadConfigError, RunError, SaveConfigError, plan_rotation, rotate, run,
    store::SnapshotStore, transfer::Rsync,
};
use shared::init_logger;
use thiserror::Error;
use tracing::{Level, error, info, warn};

#[derive(Parser)]
#[command(name = "rsync-rotate", version)]
#[command(about = "Rotation backups using rsync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, global = true)]
    log_directory: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file, YAML if the path ends in .yaml or .yml
    Init {
        /// Where to write the config
        #[arg(short, long, default_value = "config.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Transfer a new snapshot then rotate
    Run {
        /// The config file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Rotate existing snapshots without transferring
    Rotate {
        /// The config file
        #[arg(short, long)]
        config: PathBuf,
        /// Log the plan without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the rotation plan as JSON
    Plan {
        /// The config file
        #[arg(short, long)]
        config: PathBuf,
        /// Only print the snapshots kept by this tier
        #[arg(long)]
        tier: Option<Tier>,
    },
    /// List the snapshots in the destination
    List {
        /// The config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let _logger = match init_logger(cli.log_directory.as_deref(), level) {
        Ok(guards) => guards,
        Err(error) => {
            eprintln!("Could not initialise logger: {error}");
            return ExitCode::FAILURE;
        }
    };

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Commands) -> Result<(), CommandError> {
    let now = Local::now().naive_local();

    match command {
        Commands::Init { path, force } => {
            if path.exists() && !force {
                return Err(CommandError::ConfigExists(path));
            }

            Config::default().save(&path)?;
            info!("Wrote default config to {path:?}");
        }

        Commands::Run { config } => {
            let config = load_config(&config)?;
            let mut context = Context::new(config.destination.clone());
            let transfer = Rsync::new(config.rsync.clone());

            let summary = run(&mut context, &config, &transfer, now)?;
            if summary.created.is_none() {
                info!("{context}No new snapshot was due");
            }
        }

        Commands::Rotate { config, dry_run } => {
            let config = load_config(&config)?;
            let mut context = Context::new(config.destination.clone());

            rotate(&mut context, &config, now, dry_run)?;
        }

        Commands::Plan { config, tier } => {
            let config = load_config(&config)?;
            let mut context = Context::new(config.destination.clone());

            let plan = plan_rotation(&mut context, &config, now)?;
            let contents = match tier {
                Some(tier) => {
                    let kept: Vec<_> = plan.kept_by(tier).collect();
                    serde_json::to_string_pretty(&kept)?
                }
                None => serde_json::to_string_pretty(&plan)?,
            };
            writeln!(io::stdout().lock(), "{contents}").map_err(CommandError::Output)?;
        }

        Commands::List { config } => {
            let config = load_config(&config)?;
            let context = Context::new(config.destination.clone());

            let store = SnapshotStore::new(config.destination.clone());
            let snapshots = store.list(&context).map_err(RunError::from)?;
            if snapshots.is_empty() {
                warn!("{context}No snapshots found");
            }

            let mut stdout = io::stdout().lock();
            for snapshot in snapshots {
                let name = SnapshotStore::snapshot_name(snapshot.timestamp);
                let state = if snapshot.complete { "complete" } else { "partial" };
                writeln!(stdout, "{name}\t{state}").map_err(CommandError::Output)?;
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<Config, LoadConfigError> {
    let config = Config::load(path)?;
    info!("Loaded config {path:?}");
    Ok(config)
}

#[derive(Debug, Error)]
enum CommandError {
    #[error("Could not load config:\n{0}")]
    LoadConfig(#[from] LoadConfigError),

    #[error("Could not save config:\n{0}")]
    SaveConfig(#[from] SaveConfigError),

    #[error("The config file {0:?} already exists, pass --force to overwrite it")]
    ConfigExists(PathBuf),

    #[error("{0}")]
    Run(#[from] RunError),

    #[error("Could not serialize the plan:\n{0}")]
    SerializePlan(#[from] serde_json::Error),

    #[error("Could not write output:\n{0}")]
    Output(#[source] io::Error),
}

//! notesync CLI
//!
//! Command-line tools for notesync replicas.
//!
//! # Commands
//!
//! - `dump-staging` - List the events waiting in a replica's staging logs
//! - `show-state` - Display the synchronizer state and importer positions
//! - `simulate` - Run two replicas against an in-process server through a
//!   conflict and its resolution

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// notesync replica tools.
#[derive(Parser)]
#[command(name = "notesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the replica directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the events waiting in the staging logs
    DumpStaging {
        /// Which staging log to list
        #[arg(short, long, value_enum, default_value_t = StagingSide::Both)]
        side: StagingSide,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display the synchronizer state
    ShowState {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a conflict between two in-process replicas
    Simulate {
        /// How the conflict is resolved
        #[arg(short, long, value_enum, default_value_t = Choice::Local)]
        choice: Choice,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

/// Staging logs of a replica.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StagingSide {
    /// Local events waiting to be sent
    Outbound,
    /// Remote events waiting to be applied
    Inbound,
    /// Both logs
    Both,
}

/// Resolution applied by `simulate`.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Choice {
    /// Keep the local version
    Local,
    /// Keep the remote version
    Remote,
    /// Keep the remote version and a copy of the local one
    Both,
}

/// Errors reported by the CLI itself.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command needs `--path`.
    #[error("replica path required for {0}")]
    PathRequired(&'static str),

    /// `--path` does not name a directory.
    #[error("replica directory not found: {0}")]
    MissingReplica(PathBuf),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::DumpStaging { side, format } => {
            let path = cli.path.ok_or(CliError::PathRequired("dump-staging"))?;
            commands::dump_staging::run(&path, side, &format)?;
        }
        Commands::ShowState { format } => {
            let path = cli.path.ok_or(CliError::PathRequired("show-state"))?;
            commands::show_state::run(&path, &format)?;
        }
        Commands::Simulate { choice, format } => {
            commands::simulate::run(choice, &format)?;
        }
        Commands::Version => {
            println!("notesync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Preen - reconcile a target directory with a declarative source tree
#[derive(Parser, Debug)]
#[command(name = "preen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile the target directory with the source tree
    Apply {
        /// Preview changes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether the target already matches the source tree
    ///
    /// Exits with status 1 when applying would change anything.
    Verify,

    /// Print the desired contents of one target
    ///
    /// Resolves templates and decryption without touching the target.
    Cat {
        /// Target name, relative to the target directory
        target: String,
    },
}

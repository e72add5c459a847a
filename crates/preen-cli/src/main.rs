//! Preen CLI
//!
//! The command-line interface for the declarative dotfile reconciler.

mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use config::Config;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Apply { dry_run } => commands::run_apply(&config, dry_run),
        Commands::Verify => {
            if commands::run_verify(&config)? {
                Ok(())
            } else {
                eprintln!("{}", "target state differs from source state".yellow());
                std::process::exit(1);
            }
        }
        Commands::Cat { target } => commands::run_cat(&config, &target),
    }
}

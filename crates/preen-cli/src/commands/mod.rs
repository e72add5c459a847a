//! Command implementations

mod apply;
mod cat;
mod verify;

pub use apply::run_apply;
pub use cat::run_cat;
pub use verify::run_verify;

use preen_engine::SourceState;
use preen_system::System;

use crate::config::Config;
use crate::error::{CliError, Result};

/// Read and validate the source state described by the configuration.
fn load_source_state(config: &Config, system: &dyn System) -> Result<SourceState> {
    let mut state = SourceState::new(config.source_dir())
        .with_umask(config.umask()?)
        .with_encryption(config.encryption())
        .with_template_data(config.template_data()?);
    state.read(system)?;
    state.ensure_version(&current_version()?)?;
    Ok(state)
}

/// The running binary's version.
fn current_version() -> Result<semver::Version> {
    semver::Version::parse(env!("CARGO_PKG_VERSION"))
        .map_err(|e| CliError::user(format!("Invalid crate version: {e}")))
}

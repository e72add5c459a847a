//! `preen verify`

use preen_system::{CanarySystem, DryRunSystem, FileStateStore, RealSystem};

use crate::config::Config;
use crate::error::Result;

/// Check whether applying would change anything.
///
/// Forces every entry's lazy evaluation first, so template and
/// decryption failures surface even for entries that happen to be
/// converged, then runs a full apply against a canary over a dry run.
/// Returns `true` when the target already matches.
pub fn run_verify(config: &Config) -> Result<bool> {
    let real = RealSystem::new(Box::new(FileStateStore::new(config.state_file())));
    let state = super::load_source_state(config, &real)?;

    state.evaluate(&real)?;

    let dry = DryRunSystem::new(&real);
    let canary = CanarySystem::new(&dry);
    let target_dir = config.target_dir();
    state.apply_all(&canary, &target_dir)?;
    state.remove(&canary, &target_dir)?;

    Ok(!canary.mutated())
}

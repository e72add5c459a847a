//! `preen apply`

use colored::Colorize;

use preen_system::{CanarySystem, DryRunSystem, FileStateStore, RealSystem, System};

use crate::config::Config;
use crate::error::Result;

/// Reconcile the target directory, then delete remove-list targets.
///
/// With `--dry-run` the real system is wrapped in the suppress decorator,
/// so reads and content errors behave exactly like a real run while no
/// mutation reaches the disk or the state store.
pub fn run_apply(config: &Config, dry_run: bool) -> Result<()> {
    let real = RealSystem::new(Box::new(FileStateStore::new(config.state_file())));
    let state = super::load_source_state(config, &real)?;

    if dry_run {
        let dry = DryRunSystem::new(&real);
        apply(&state, &dry, config, dry_run)
    } else {
        apply(&state, &real, config, dry_run)
    }
}

fn apply(
    state: &preen_engine::SourceState,
    system: &dyn System,
    config: &Config,
    dry_run: bool,
) -> Result<()> {
    let target_dir = config.target_dir();

    for name in state.target_names() {
        // A per-target canary tells us whether this entry needed anything
        let canary = CanarySystem::new(system);
        state.apply_one(&canary, &target_dir, name)?;
        if canary.mutated() {
            if dry_run {
                println!("{} {name}", "would update".yellow().bold());
            } else {
                println!("{} {name}", "updated".green().bold());
            }
        }
    }

    state.remove(system, &target_dir)?;
    Ok(())
}

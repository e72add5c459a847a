//! `preen cat`

use std::io::Write;

use preen_engine::{RelPath, TargetStateEntry};
use preen_system::{FileStateStore, RealSystem};

use crate::config::Config;
use crate::error::{CliError, Result};

/// Print the desired contents of one target, exercising the full lazy
/// pipeline (read, decrypt, render) without mutating anything.
pub fn run_cat(config: &Config, target: &str) -> Result<()> {
    let real = RealSystem::new(Box::new(FileStateStore::new(config.state_file())));
    let state = super::load_source_state(config, &real)?;

    let name = RelPath::new(target);
    let entry = state
        .entry(&name)
        .ok_or_else(|| CliError::user(format!("Not in source state: {target}")))?;

    match entry.target_entry() {
        TargetStateEntry::File { contents, .. } | TargetStateEntry::Script { contents, .. } => {
            let bytes = contents.bytes(&real)?;
            std::io::stdout().write_all(&bytes)?;
            Ok(())
        }
        TargetStateEntry::Symlink { linkname } => {
            println!("{}", linkname.linkname(&real)?);
            Ok(())
        }
        TargetStateEntry::Dir { .. } => {
            Err(CliError::user(format!("{target} is a directory")))
        }
        TargetStateEntry::Absent => Err(CliError::user(format!("{target} is absent"))),
    }
}

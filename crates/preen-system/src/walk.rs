//! Depth-first traversal over the `System` capability surface

use std::fs::Metadata;
use std::path::Path;

use crate::system::System;
use crate::Error;

/// What the walk callback wants done with a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Descend into the directory
    Descend,

    /// Skip the directory's contents
    SkipDir,
}

/// Walk a tree rooted at `root`, pre-order, entries sorted by name.
///
/// The callback sees every path including `root` itself, with its `lstat`
/// metadata. Returning [`WalkAction::SkipDir`] for a directory skips its
/// contents; the action is ignored for non-directories. Generic over the
/// caller's error type so engine errors pass through unchanged.
pub fn walk<E, F>(system: &dyn System, root: &Path, f: &mut F) -> Result<(), E>
where
    E: From<Error>,
    F: FnMut(&Path, &Metadata) -> Result<WalkAction, E>,
{
    let metadata = system.lstat(root).map_err(E::from)?;
    let action = f(root, &metadata)?;
    if metadata.is_dir() && action == WalkAction::Descend {
        // read_dir sorts by name, so traversal order is deterministic
        for entry in system.read_dir(root).map_err(E::from)? {
            walk(system, &root.join(&entry.name), f)?;
        }
    }
    Ok(())
}

//! The `System` trait: every read and every mutation flows through it

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use crate::Result;

/// A directory entry returned by [`System::read_dir`].
///
/// Carries the entry name together with its `lstat` metadata so callers
/// classifying a tree do not have to stat every entry a second time.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// File name of the entry, without any leading path component
    pub name: String,

    /// Metadata of the entry itself (symlinks are not followed)
    pub metadata: Metadata,
}

/// The capability surface for all target-state access.
///
/// Everything the reconciliation engine does to the outside world -
/// filesystem reads and writes, script execution, persistent state - goes
/// through this trait. Decorators ([`DryRunSystem`](crate::DryRunSystem),
/// [`CanarySystem`](crate::CanarySystem)) wrap any `System` and compose in
/// any order; [`RealSystem`](crate::RealSystem) is the one that actually
/// touches the operating system.
pub trait System: Send + Sync {
    // Persistent state

    /// Read a value from the persistent state store.
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a value to the persistent state store.
    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key from the persistent state store.
    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()>;

    // Filesystem reads

    /// Expand a glob pattern, returning matching paths sorted lexicographically.
    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Stat a path without following a final symlink.
    fn lstat(&self, path: &Path) -> Result<Metadata>;

    /// Stat a path, following symlinks.
    fn stat(&self, path: &Path) -> Result<Metadata>;

    /// List a directory, sorted by entry name.
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read the full contents of a file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read the target of a symlink.
    fn read_link(&self, path: &Path) -> Result<PathBuf>;

    // Filesystem writes

    /// Change the permission bits of a path.
    fn chmod(&self, path: &Path, mode: u32) -> Result<()>;

    /// Create a directory with the given permission bits.
    ///
    /// The parent directory must already exist; the reconciliation driver
    /// applies parents before children.
    fn mkdir(&self, path: &Path, mode: u32) -> Result<()>;

    /// Remove a path and everything under it. A path that does not exist
    /// is success, not an error.
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Rename a path. Atomic when source and destination share a filesystem.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create or replace a symlink at `path` pointing to `linkname`.
    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()>;

    /// Write a file with the given contents and permission bits,
    /// truncating any existing file.
    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()>;

    // Process execution

    /// Execute `contents` as a script with inherited standard streams.
    ///
    /// `name` is used for the temporary file suffix and error reporting.
    /// A non-zero exit status is an error.
    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()>;

    /// Run a command assumed to be side-effect-free and return its stdout.
    fn idempotent_cmd_output(&self, command: &str, args: &[&str]) -> Result<Vec<u8>>;
}

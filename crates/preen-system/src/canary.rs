//! Mutation-canary decorator: forwards everything, remembers whether
//! anything mutated

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::system::{DirEntry, System};
use crate::Result;

/// A `System` decorator that records whether any mutating call occurred.
///
/// Every call forwards to the inner system unchanged; the canary is pure
/// observation. Wrapping a [`DryRunSystem`](crate::DryRunSystem) answers
/// "would anything change?" without changing anything.
pub struct CanarySystem<'a> {
    inner: &'a dyn System,
    mutated: AtomicBool,
}

impl<'a> CanarySystem<'a> {
    /// Wrap a system with mutation observation.
    pub fn new(inner: &'a dyn System) -> Self {
        Self {
            inner,
            mutated: AtomicBool::new(false),
        }
    }

    /// Whether any mutating call has been issued since construction.
    pub fn mutated(&self) -> bool {
        self.mutated.load(Ordering::Relaxed)
    }

    fn trip(&self) {
        self.mutated.store(true, Ordering::Relaxed);
    }
}

impl System for CanarySystem<'_> {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.trip();
        self.inner.set(bucket, key, value)
    }

    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        self.trip();
        self.inner.delete(bucket, key)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        self.inner.glob(pattern)
    }

    fn lstat(&self, path: &Path) -> Result<Metadata> {
        self.inner.lstat(path)
    }

    fn stat(&self, path: &Path) -> Result<Metadata> {
        self.inner.stat(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read_file(path)
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        self.inner.read_link(path)
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        self.trip();
        self.inner.chmod(path, mode)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        self.trip();
        self.inner.mkdir(path, mode)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        self.trip();
        self.inner.remove_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.trip();
        self.inner.rename(from, to)
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        self.trip();
        self.inner.write_symlink(linkname, path)
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
        self.trip();
        self.inner.write_file(path, contents, mode)
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        self.trip();
        self.inner.run_script(name, contents)
    }

    fn idempotent_cmd_output(&self, command: &str, args: &[&str]) -> Result<Vec<u8>> {
        self.inner.idempotent_cmd_output(command, args)
    }
}

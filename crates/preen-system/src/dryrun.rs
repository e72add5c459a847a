//! Dry-run decorator: reads pass through, mutations succeed without effect

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::system::{DirEntry, System};
use crate::Result;

/// A `System` decorator that suppresses every mutation.
///
/// All read calls forward to the inner system unchanged, so stat, content,
/// and classification errors surface exactly as they would in a real run.
/// Every mutating call reports success without touching the inner system.
pub struct DryRunSystem<'a> {
    inner: &'a dyn System,
}

impl<'a> DryRunSystem<'a> {
    /// Wrap a system so that no mutation reaches it.
    pub fn new(inner: &'a dyn System) -> Self {
        Self { inner }
    }
}

impl System for DryRunSystem<'_> {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(bucket, key)
    }

    fn set(&self, _bucket: &[u8], _key: &[u8], _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _bucket: &[u8], _key: &[u8]) -> Result<()> {
        Ok(())
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
        debug!(path = %path.display(), mode = format_args!("{mode:o}"), "dry-run: would chmod");
        Ok(())
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        debug!(path = %path.display(), mode = format_args!("{mode:o}"), "dry-run: would mkdir");
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "dry-run: would remove");
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        debug!(from = %from.display(), to = %to.display(), "dry-run: would rename");
        Ok(())
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        debug!(path = %path.display(), linkname, "dry-run: would write symlink");
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
        debug!(
            path = %path.display(),
            mode = format_args!("{mode:o}"),
            len = contents.len(),
            "dry-run: would write file"
        );
        Ok(())
    }

    fn run_script(&self, name: &str, _contents: &[u8]) -> Result<()> {
        debug!(name, "dry-run: would run script");
        Ok(())
    }

    fn idempotent_cmd_output(&self, command: &str, args: &[&str]) -> Result<Vec<u8>> {
        // Idempotent by contract, so forwarding is safe even in a dry run
        self.inner.idempotent_cmd_output(command, args)
    }
}

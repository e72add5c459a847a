//! The real operating-system backend

use std::fs::{self, Metadata, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::state::PersistentState;
use crate::system::{DirEntry, System};
use crate::{Error, Result};

/// The `System` implementation that actually touches the operating system.
///
/// Owns the persistent state store; filesystem and process calls delegate
/// to `std::fs` and `std::process` directly.
pub struct RealSystem {
    state: Box<dyn PersistentState>,
}

impl RealSystem {
    /// Create a real system backed by the given persistent state store.
    pub fn new(state: Box<dyn PersistentState>) -> Self {
        Self { state }
    }
}

impl System for RealSystem {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.state.get(bucket, key)
    }

    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.state.set(bucket, key, value)
    }

    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        self.state.delete(bucket, key)
    }

    fn glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = glob::glob(pattern).map_err(|e| Error::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut matches = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                Error::io(path, e.into_error())
            })?;
            matches.push(path);
        }
        matches.sort();
        Ok(matches)
    }

    fn lstat(&self, path: &Path) -> Result<Metadata> {
        fs::symlink_metadata(path).map_err(|e| Error::io(path, e))
    }

    fn stat(&self, path: &Path) -> Result<Metadata> {
        fs::metadata(path).map_err(|e| Error::io(path, e))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| Error::io(path, e))? {
            let entry = entry.map_err(|e| Error::io(path, e))?;
            // DirEntry::metadata does not follow symlinks, matching lstat
            let metadata = entry.metadata().map_err(|e| Error::io(entry.path(), e))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                metadata,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::io(path, e))
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        fs::read_link(path).map_err(|e| Error::io(path, e))
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        debug!(path = %path.display(), mode = format_args!("{mode:o}"), "chmod");
        fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> Result<()> {
        debug!(path = %path.display(), mode = format_args!("{mode:o}"), "mkdir");
        fs::DirBuilder::new()
            .mode(mode)
            .create(path)
            .map_err(|e| Error::io(path, e))
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "remove_all");
        let result = match fs::symlink_metadata(path) {
            Ok(md) if md.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        debug!(from = %from.display(), to = %to.display(), "rename");
        fs::rename(from, to).map_err(|e| Error::io(from, e))
    }

    fn write_symlink(&self, linkname: &str, path: &Path) -> Result<()> {
        debug!(path = %path.display(), linkname, "write_symlink");

        // Create the symlink at a sibling temp name and rename it over the
        // target so replacement is atomic where the filesystem allows it.
        let temp_name = format!(
            ".{}.{}.tmp",
            path.file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default(),
            std::process::id()
        );
        let temp_path = path.with_file_name(&temp_name);

        symlink(linkname, &temp_path).map_err(|e| Error::io(&temp_path, e))?;
        match fs::rename(&temp_path, path) {
            Ok(()) => Ok(()),
            Err(_) => {
                // rename cannot replace a directory; fall back to remove-then-link
                let _ = fs::remove_file(&temp_path);
                self.remove_all(path)?;
                symlink(linkname, path).map_err(|e| Error::io(path, e))
            }
        }
    }

    fn write_file(&self, path: &Path, contents: &[u8], mode: u32) -> Result<()> {
        debug!(
            path = %path.display(),
            mode = format_args!("{mode:o}"),
            len = contents.len(),
            "write_file"
        );

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode)
            .open(path)
            .map_err(|e| Error::io(path, e))?;

        // The open mode only applies on creation; an existing file keeps its
        // old bits. Force the permission before any data is written - the
        // previous contents may have been more sensitive than the new mode,
        // and the new contents may be more sensitive than the old mode.
        file.set_permissions(Permissions::from_mode(mode))
            .map_err(|e| Error::io(path, e))?;

        let mut file = file;
        file.write_all(contents).map_err(|e| Error::io(path, e))?;
        file.sync_all().map_err(|e| Error::io(path, e))?;

        // And again after the write, in case anything chmodded the file
        // while the contents were in flight.
        file.set_permissions(Permissions::from_mode(mode))
            .map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    fn run_script(&self, name: &str, contents: &[u8]) -> Result<()> {
        debug!(name, len = contents.len(), "run_script");

        // Private temp file; the suffix keeps the script's own name so
        // interpreters that sniff extensions still work.
        let mut temp_file = tempfile::Builder::new()
            .prefix("preen-")
            .suffix(&format!("-{name}"))
            .permissions(Permissions::from_mode(0o700))
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        temp_file
            .write_all(contents)
            .map_err(|e| Error::io(temp_file.path(), e))?;

        // Close the handle before exec; the TempPath guard still deletes
        // the file on every exit path, including errors below.
        let temp_path = temp_file.into_temp_path();

        let status = Command::new(&temp_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::io(&temp_path, e))?;

        if !status.success() {
            return Err(Error::ScriptExit {
                name: name.to_string(),
                status,
            });
        }
        Ok(())
    }

    fn idempotent_cmd_output(&self, command: &str, args: &[&str]) -> Result<Vec<u8>> {
        debug!(command, ?args, "idempotent_cmd_output");
        let output = Command::new(command)
            .args(args)
            .output()
            .map_err(|e| Error::Command {
                command: command.to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::Command {
                command: command.to_string(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output.stdout)
    }
}

//! Desired target state and the apply/evaluate state machine

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use preen_system::System;

use crate::lazy::{LazyContents, LazyLinkname};
use crate::{Error, Result};

/// Persistent-state bucket recording which once-scripts have run.
pub const SCRIPT_STATE_BUCKET: &[u8] = b"script";

/// Run record stored against a once-script's content hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScriptRunRecord {
    /// Decoded script name at the time it ran
    pub name: String,
    /// When the run completed
    pub ran_at: DateTime<Utc>,
}

/// What an entry should become on the target.
///
/// The variant is fixed at construction from the entry's attribute
/// record; applying means comparing it against the fresh [`ActualState`]
/// and issuing the minimal operation, so an already-converged target sees
/// no mutation at all.
#[derive(Debug)]
pub enum TargetStateEntry {
    /// Nothing may exist at the target path
    Absent,

    /// A directory with the given permission bits
    Dir {
        perm: u32,
        /// Children absent from the source mapping must be pruned;
        /// enforced by the reconciliation driver, which has the full map
        exact: bool,
    },

    /// A regular file
    File {
        contents: LazyContents,
        perm: u32,
        /// Write the file even when the contents are empty; otherwise
        /// empty contents mean the target must be absent
        empty: bool,
    },

    /// A script executed on apply, never compared to on-disk state
    Script {
        contents: LazyContents,
        /// Decoded name, for the temp-file suffix and the run record
        name: String,
        /// Run at most once per distinct content hash
        once: bool,
    },

    /// A symlink
    Symlink { linkname: LazyLinkname },
}

/// The actual on-target state at one path, from a fresh `lstat`.
#[derive(Debug)]
pub enum ActualState {
    Absent { path: PathBuf },
    Dir { path: PathBuf, perm: u32 },
    File { path: PathBuf, perm: u32 },
    Symlink { path: PathBuf, linkname: String },
}

impl ActualState {
    /// Query the target path. Unsupported entry kinds (device, socket,
    /// fifo) are a classification error.
    pub fn read(system: &dyn System, path: &Path) -> Result<Self> {
        let metadata = match system.lstat(path) {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                return Ok(Self::Absent {
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            let linkname = system.read_link(path)?.to_string_lossy().into_owned();
            Ok(Self::Symlink {
                path: path.to_path_buf(),
                linkname,
            })
        } else if file_type.is_dir() {
            Ok(Self::Dir {
                path: path.to_path_buf(),
                perm: metadata.permissions().mode() & 0o7777,
            })
        } else if file_type.is_file() {
            Ok(Self::File {
                path: path.to_path_buf(),
                perm: metadata.permissions().mode() & 0o7777,
            })
        } else {
            Err(Error::UnsupportedFileType {
                path: path.to_path_buf(),
            })
        }
    }

    /// The queried path.
    pub fn path(&self) -> &Path {
        match self {
            Self::Absent { path }
            | Self::Dir { path, .. }
            | Self::File { path, .. }
            | Self::Symlink { path, .. } => path,
        }
    }
}

impl TargetStateEntry {
    /// Reconcile the target at `actual.path()` to this desired state with
    /// the minimal operation. Re-applying a converged target mutates
    /// nothing.
    pub fn apply(&self, system: &dyn System, actual: &ActualState) -> Result<()> {
        let path = actual.path();
        match self {
            Self::Absent => match actual {
                ActualState::Absent { .. } => Ok(()),
                _ => Ok(system.remove_all(path)?),
            },

            Self::Dir { perm, exact: _ } => match actual {
                ActualState::Dir {
                    perm: actual_perm, ..
                } => {
                    if actual_perm != perm {
                        system.chmod(path, *perm)?;
                    }
                    Ok(())
                }
                ActualState::Absent { .. } => Ok(system.mkdir(path, *perm)?),
                _ => {
                    system.remove_all(path)?;
                    Ok(system.mkdir(path, *perm)?)
                }
            },

            Self::File {
                contents,
                perm,
                empty,
            } => {
                let bytes = contents.bytes(system)?;
                if bytes.is_empty() && !empty {
                    // Empty rendered contents without the empty attribute
                    // mean the target must not exist
                    return match actual {
                        ActualState::Absent { .. } => Ok(()),
                        _ => Ok(system.remove_all(path)?),
                    };
                }
                match actual {
                    ActualState::File {
                        perm: actual_perm, ..
                    } => {
                        if *system.read_file(path)? == *bytes {
                            if actual_perm != perm {
                                system.chmod(path, *perm)?;
                            }
                            Ok(())
                        } else {
                            Ok(system.write_file(path, &bytes, *perm)?)
                        }
                    }
                    ActualState::Absent { .. } => Ok(system.write_file(path, &bytes, *perm)?),
                    _ => {
                        system.remove_all(path)?;
                        Ok(system.write_file(path, &bytes, *perm)?)
                    }
                }
            }

            Self::Symlink { linkname } => {
                let linkname = linkname.linkname(system)?;
                match actual {
                    ActualState::Symlink {
                        linkname: actual_linkname,
                        ..
                    } if *actual_linkname == linkname => Ok(()),
                    _ => Ok(system.write_symlink(&linkname, path)?),
                }
            }

            Self::Script {
                contents,
                name,
                once,
            } => {
                let bytes = contents.bytes(system)?;
                if bytes.is_empty() {
                    return Ok(());
                }

                let key = content_hash(&bytes);
                if *once && system.get(SCRIPT_STATE_BUCKET, key.as_bytes())?.is_some() {
                    debug!(name, "once-script already ran, skipping");
                    return Ok(());
                }

                system.run_script(name, &bytes)?;

                if *once {
                    let record = ScriptRunRecord {
                        name: name.clone(),
                        ran_at: Utc::now(),
                    };
                    system.set(
                        SCRIPT_STATE_BUCKET,
                        key.as_bytes(),
                        &serde_json::to_vec(&record)?,
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Force the entry's lazy resolution without touching the target.
    pub fn evaluate(&self, system: &dyn System) -> Result<()> {
        match self {
            Self::Absent | Self::Dir { .. } => Ok(()),
            Self::File { contents, .. } | Self::Script { contents, .. } => {
                contents.bytes(system).map(|_| ())
            }
            Self::Symlink { linkname } => linkname.linkname(system).map(|_| ()),
        }
    }
}

/// Lowercase hex SHA-256, the once-script state key.
fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

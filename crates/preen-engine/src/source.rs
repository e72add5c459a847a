//! Source state: the tree walk and the reconciliation driver

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use semver::Version;
use tracing::debug;

use preen_system::{walk, Encryption, NoEncryption, System, WalkAction};

use crate::attr::{DirAttributes, FileAttributes, SourceFileKind};
use crate::error::DuplicateTarget;
use crate::lazy::{LazyContents, LazyLinkname};
use crate::pattern::PatternSet;
use crate::relpath::RelPath;
use crate::target::{ActualState, TargetStateEntry};
use crate::template::Templates;
use crate::{Error, Result};

/// Special source names, all under one fixed prefix.
pub const IGNORE_FILE: &str = ".preenignore";
pub const REMOVE_FILE: &str = ".preenremove";
pub const TEMPLATES_DIR: &str = ".preentemplates";
pub const VERSION_FILE: &str = ".preenversion";

/// One classified source entry: its source path, its decoded attributes,
/// and the target state it describes.
///
/// Created once during the walk and immutable afterward; the only later
/// change is memoization inside the file variant's lazy cell. An entry
/// never mutates the target itself, it is a description plus a deferred
/// evaluator.
#[derive(Debug)]
pub enum SourceStateEntry {
    Dir {
        source_path: PathBuf,
        attr: DirAttributes,
        target: TargetStateEntry,
    },
    File {
        source_path: PathBuf,
        attr: FileAttributes,
        target: TargetStateEntry,
    },
}

impl SourceStateEntry {
    /// The path of the entry in the source tree.
    pub fn source_path(&self) -> &Path {
        match self {
            Self::Dir { source_path, .. } | Self::File { source_path, .. } => source_path,
        }
    }

    /// The desired target state this entry describes.
    pub fn target_entry(&self) -> &TargetStateEntry {
        match self {
            Self::Dir { target, .. } | Self::File { target, .. } => target,
        }
    }
}

/// The decoded source tree: the deduplicated target-name mapping plus the
/// ignore and remove pattern sets and the minimum-version marker.
pub struct SourceState {
    source_dir: PathBuf,
    umask: u32,
    encryption: Arc<dyn Encryption>,
    templates: Arc<Templates>,
    entries: BTreeMap<RelPath, SourceStateEntry>,
    ignore: PatternSet,
    remove: PatternSet,
    min_version: Option<Version>,
}

impl SourceState {
    /// Create an empty source state rooted at `source_dir`, with the
    /// default umask (0o022), no encryption backend, and no template data.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            umask: 0o022,
            encryption: Arc::new(NoEncryption),
            templates: Arc::new(Templates::default()),
            entries: BTreeMap::new(),
            ignore: PatternSet::new(),
            remove: PatternSet::new(),
            min_version: None,
        }
    }

    /// Set the umask applied to every derived permission.
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask;
        self
    }

    /// Set the encryption backend for `encrypted_` entries.
    pub fn with_encryption(mut self, encryption: Arc<dyn Encryption>) -> Self {
        self.encryption = encryption;
        self
    }

    /// Set the data every template render sees.
    pub fn with_template_data(mut self, data: serde_json::Value) -> Self {
        self.templates = Arc::new(Templates::new(data));
        self
    }

    /// Walk the source tree once, classifying every entry and building the
    /// target mapping.
    ///
    /// Special names are handled before normal classification; hidden
    /// entries are skipped; ignored target names are skipped without
    /// descending. Target names claimed by more than one source entry are
    /// collected across the whole tree and reported as one aggregated
    /// error before the final map is built.
    pub fn read(&mut self, system: &dyn System) -> Result<()> {
        let mut pending: BTreeMap<RelPath, Vec<SourceStateEntry>> = BTreeMap::new();
        let mut dirs: HashMap<PathBuf, RelPath> = HashMap::new();
        dirs.insert(self.source_dir.clone(), RelPath::root());

        let source_dir = self.source_dir.clone();
        let SourceState {
            source_dir: _,
            umask,
            encryption,
            templates,
            ignore,
            remove,
            min_version,
            entries: _,
        } = &mut *self;
        let umask = *umask;

        walk::<Error, _>(system, &source_dir, &mut |path, metadata| {
            if path == source_dir.as_path() {
                return Ok(WalkAction::Descend);
            }

            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => return Ok(WalkAction::SkipDir),
            };
            // Parents are registered before their children are visited,
            // and skipped directories are never descended
            let Some(parent_rel) = path.parent().and_then(|p| dirs.get(p)).cloned() else {
                return Ok(WalkAction::SkipDir);
            };

            // Special names come before normal classification
            if name == IGNORE_FILE && metadata.is_file() {
                read_pattern_file(system, templates, ignore, path, &parent_rel)?;
                return Ok(WalkAction::Descend);
            }
            if name == REMOVE_FILE && metadata.is_file() {
                read_pattern_file(system, templates, remove, path, &parent_rel)?;
                return Ok(WalkAction::Descend);
            }
            if name == TEMPLATES_DIR && metadata.is_dir() {
                register_templates(system, templates, path)?;
                return Ok(WalkAction::SkipDir);
            }
            if name == VERSION_FILE && metadata.is_file() {
                let version = read_version_file(system, path)?;
                if min_version.as_ref().is_none_or(|v| version > *v) {
                    *min_version = Some(version);
                }
                return Ok(WalkAction::Descend);
            }
            if name.starts_with('.') {
                // Hidden source entries are not part of the mapping
                return Ok(WalkAction::SkipDir);
            }

            let file_type = metadata.file_type();
            if file_type.is_dir() {
                let attr = DirAttributes::parse(&name);
                let target_rel = parent_rel.join(&attr.name);
                if ignore.matches(&target_rel) {
                    debug!(target = %target_rel, "ignoring source directory");
                    return Ok(WalkAction::SkipDir);
                }
                dirs.insert(path.to_path_buf(), target_rel.clone());
                let target = TargetStateEntry::Dir {
                    perm: attr.perm(umask),
                    exact: attr.exact,
                };
                pending
                    .entry(target_rel)
                    .or_default()
                    .push(SourceStateEntry::Dir {
                        source_path: path.to_path_buf(),
                        attr,
                        target,
                    });
                Ok(WalkAction::Descend)
            } else if file_type.is_file() {
                let attr = FileAttributes::parse(&name);
                let target_rel = parent_rel.join(&attr.name);
                if ignore.matches(&target_rel) {
                    debug!(target = %target_rel, "ignoring source file");
                    return Ok(WalkAction::Descend);
                }
                let entry = new_file_entry(
                    path.to_path_buf(),
                    attr,
                    &target_rel,
                    umask,
                    encryption,
                    templates,
                );
                pending.entry(target_rel).or_default().push(entry);
                Ok(WalkAction::Descend)
            } else {
                // Devices, sockets, fifos, and symlinks inside the source
                // tree cannot be classified
                Err(Error::UnsupportedFileType {
                    path: path.to_path_buf(),
                })
            }
        })?;

        let mut duplicates = Vec::new();
        let mut entries = BTreeMap::new();
        for (target, mut found) in pending {
            if found.len() > 1 {
                duplicates.push(DuplicateTarget {
                    target,
                    sources: found.iter().map(|e| e.source_path().to_path_buf()).collect(),
                });
            } else if let Some(entry) = found.pop() {
                entries.insert(target, entry);
            }
        }
        if !duplicates.is_empty() {
            return Err(Error::DuplicateTargets { duplicates });
        }

        self.entries = entries;
        Ok(())
    }

    /// All target names, in application order.
    pub fn target_names(&self) -> impl Iterator<Item = &RelPath> {
        self.entries.keys()
    }

    /// Look up one target's source entry.
    pub fn entry(&self, name: &RelPath) -> Option<&SourceStateEntry> {
        self.entries.get(name)
    }

    /// Apply every target in lexicographic order, so a parent directory
    /// is applied before any child path needs it. Exact directories
    /// additionally have unmapped children pruned.
    pub fn apply_all(&self, system: &dyn System, target_dir: &Path) -> Result<()> {
        for (name, entry) in &self.entries {
            self.apply_entry(system, target_dir, name, entry)?;
        }
        Ok(())
    }

    /// Apply a single named target.
    pub fn apply_one(&self, system: &dyn System, target_dir: &Path, name: &RelPath) -> Result<()> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownTarget { name: name.clone() })?;
        self.apply_entry(system, target_dir, name, entry)
    }

    fn apply_entry(
        &self,
        system: &dyn System,
        target_dir: &Path,
        name: &RelPath,
        entry: &SourceStateEntry,
    ) -> Result<()> {
        debug!(target = %name, "applying");
        let target_path = name.to_path(target_dir);
        let actual = ActualState::read(system, &target_path)?;
        let desired = entry.target_entry();
        desired.apply(system, &actual)?;

        if let TargetStateEntry::Dir { exact: true, .. } = desired {
            self.prune_exact(system, target_dir, name)?;
        }
        Ok(())
    }

    /// Delete children of an exact directory that no source entry maps.
    /// Ignored names survive pruning.
    fn prune_exact(&self, system: &dyn System, target_dir: &Path, name: &RelPath) -> Result<()> {
        let dir_path = name.to_path(target_dir);
        let children = match system.read_dir(&dir_path) {
            Ok(children) => children,
            // Under dry-run the mkdir never happened; nothing to prune
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for child in children {
            let child_rel = name.join(&child.name);
            if !self.entries.contains_key(&child_rel) && !self.ignore.matches(&child_rel) {
                debug!(target = %child_rel, "pruning unmapped child of exact directory");
                system.remove_all(&child_rel.to_path(target_dir))?;
            }
        }
        Ok(())
    }

    /// Delete targets matched by the remove pattern set, in lexicographic
    /// order. Parent-before-child is safe because `remove_all` treats
    /// already-gone as success.
    pub fn remove(&self, system: &dyn System, target_dir: &Path) -> Result<()> {
        let mut targets = BTreeSet::new();
        for pattern in self.remove.include_globs() {
            let full_pattern = format!("{}/{pattern}", target_dir.display());
            for path in system.glob(&full_pattern)? {
                let Ok(rel) = path.strip_prefix(target_dir) else {
                    continue;
                };
                let rel = rel_path_of(rel);
                // Negations in the same set filter the matches back out
                if self.remove.matches(&rel) {
                    targets.insert(rel);
                }
            }
        }
        for rel in targets {
            debug!(target = %rel, "removing");
            system.remove_all(&rel.to_path(target_dir))?;
        }
        Ok(())
    }

    /// Force every entry's lazy resolution (templates, decryption)
    /// without touching the target. Used to validate the whole tree
    /// before any mutation begins.
    pub fn evaluate(&self, system: &dyn System) -> Result<()> {
        for entry in self.entries.values() {
            entry.target_entry().evaluate(system)?;
        }
        Ok(())
    }

    /// Error when a version marker demands a newer version than `current`.
    pub fn ensure_version(&self, current: &Version) -> Result<()> {
        match &self.min_version {
            Some(required) if required > current => Err(Error::SourceTooOld {
                required: required.clone(),
                current: current.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// The minimum version demanded by the source tree, if any.
    pub fn min_version(&self) -> Option<&Version> {
        self.min_version.as_ref()
    }
}

/// Build the file entry for one classified source file, wiring the
/// read-decrypt-render pipeline into a single lazy cell.
fn new_file_entry(
    source_path: PathBuf,
    attr: FileAttributes,
    target_rel: &RelPath,
    umask: u32,
    encryption: &Arc<dyn Encryption>,
    templates: &Arc<Templates>,
) -> SourceStateEntry {
    let cell_name = target_rel.to_string();
    let contents = {
        let source_path = source_path.clone();
        let encrypted = attr.encrypted;
        let template = attr.template;
        let hint_name = attr.name.clone();
        let encryption = Arc::clone(encryption);
        let templates = Arc::clone(templates);
        let name = cell_name.clone();
        LazyContents::new(
            &cell_name,
            Box::new(move |system: &dyn System| {
                let mut contents = system.read_file(&source_path)?;
                if encrypted {
                    contents = encryption.decrypt(&hint_name, &contents)?;
                }
                if template {
                    let text = String::from_utf8(contents)
                        .map_err(|_| Error::content(&name, "template source is not valid UTF-8"))?;
                    contents = templates.execute(&name, &text)?.into_bytes();
                }
                Ok(contents)
            }),
        )
    };

    let target = match attr.kind {
        SourceFileKind::File => TargetStateEntry::File {
            contents,
            perm: attr.perm(umask),
            empty: attr.empty,
        },
        SourceFileKind::Script => TargetStateEntry::Script {
            contents,
            name: attr.name.clone(),
            once: attr.once,
        },
        SourceFileKind::Symlink => TargetStateEntry::Symlink {
            linkname: LazyLinkname::new(contents),
        },
    };

    SourceStateEntry::File {
        source_path,
        attr,
        target,
    }
}

/// Parse a line-oriented pattern file into `set`, anchored at `dir`.
///
/// `#` strips a trailing comment, blank lines are skipped, a `!` prefix
/// negates. The file contents are template-executed before parsing.
fn read_pattern_file(
    system: &dyn System,
    templates: &Templates,
    set: &mut PatternSet,
    path: &Path,
    dir: &RelPath,
) -> Result<()> {
    let raw = system.read_file(path)?;
    let file_name = path.display().to_string();
    let text = String::from_utf8(raw)
        .map_err(|_| Error::content(&file_name, "pattern file is not valid UTF-8"))?;
    let rendered = templates.execute(&file_name, &text)?;

    for line in rendered.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (pattern, include) = match line.strip_prefix('!') {
            Some(negated) => (negated, false),
            None => (line, true),
        };
        let anchored = if dir.is_root() {
            pattern.to_string()
        } else {
            format!("{dir}/{pattern}")
        };
        set.add(&anchored, include).map_err(|e| Error::InvalidPattern {
            file: path.to_path_buf(),
            pattern: anchored.clone(),
            source: e,
        })?;
    }
    Ok(())
}

/// Register every file under the template library directory, named by its
/// path relative to that directory.
fn register_templates(system: &dyn System, templates: &Templates, base: &Path) -> Result<()> {
    let base = base.to_path_buf();
    walk::<Error, _>(system, &base, &mut |path, metadata| {
        if metadata.is_file() {
            let Ok(rel) = path.strip_prefix(&base) else {
                return Ok(WalkAction::Descend);
            };
            let name = rel_path_of(rel).to_string();
            let contents = system.read_file(path)?;
            let text = String::from_utf8(contents)
                .map_err(|_| Error::content(&name, "template is not valid UTF-8"))?;
            templates.register(&name, text)?;
        }
        Ok(WalkAction::Descend)
    })
}

fn read_version_file(system: &dyn System, path: &Path) -> Result<Version> {
    let raw = system.read_file(path)?;
    let text = String::from_utf8_lossy(&raw);
    Version::parse(text.trim()).map_err(|e| Error::InvalidVersion {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Convert a filesystem-relative path into a slash-separated RelPath.
fn rel_path_of(path: &Path) -> RelPath {
    let mut rel = RelPath::root();
    for component in path.components() {
        rel = rel.join(&component.as_os_str().to_string_lossy());
    }
    rel
}

//! Attribute codec: encoded source names to structured intent and back
//!
//! A source name like `private_dot_netrc.tmpl` decodes to "the target file
//! `.netrc`, owner-only, rendered through the template engine". Parsing
//! never fails; rendering rejects attribute combinations that have no
//! encoding. The two directions are exact inverses for every valid record.

use crate::{Error, Result};

/// The closed prefix/suffix vocabulary. Stripping order is fixed; it is
/// what makes the codec invertible.
mod marker {
    pub const DOT: &str = "dot_";
    pub const EMPTY: &str = "empty_";
    pub const ENCRYPTED: &str = "encrypted_";
    pub const EXACT: &str = "exact_";
    pub const EXECUTABLE: &str = "executable_";
    pub const ONCE: &str = "once_";
    pub const PRIVATE: &str = "private_";
    pub const RUN: &str = "run_";
    pub const SYMLINK: &str = "symlink_";
    pub const TEMPLATE_SUFFIX: &str = ".tmpl";
}

/// Strip `prefix` from `name`, reporting whether it was present.
fn strip<'a>(name: &'a str, prefix: &str) -> (&'a str, bool) {
    match name.strip_prefix(prefix) {
        Some(rest) => (rest, true),
        None => (name, false),
    }
}

/// Strip the template suffix, reporting whether it was present.
fn strip_template(name: &str) -> (&str, bool) {
    match name.strip_suffix(marker::TEMPLATE_SUFFIX) {
        Some(rest) => (rest, true),
        None => (name, false),
    }
}

/// Re-encode a target name's leading dot as the `dot_` prefix.
fn encode_dot(name: &str) -> String {
    match name.strip_prefix('.') {
        Some(rest) => format!("{}{rest}", marker::DOT),
        None => name.to_string(),
    }
}

/// Decode a `dot_`-stripped name back into its target form.
fn decode_dot(name: &str, dot: bool) -> String {
    if dot {
        format!(".{name}")
    } else {
        name.to_string()
    }
}

/// Decoded intent of a source directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirAttributes {
    /// Target name, leading dot already applied
    pub name: String,

    /// Target children absent from the source must be deleted
    pub exact: bool,

    /// Permission bits restricted to the owner
    pub private: bool,
}

impl DirAttributes {
    /// Decode a source directory name. Never fails; unrecognized markers
    /// stay in the name.
    pub fn parse(source_name: &str) -> Self {
        let (rest, exact) = strip(source_name, marker::EXACT);
        let (rest, private) = strip(rest, marker::PRIVATE);
        let (rest, dot) = strip(rest, marker::DOT);
        Self {
            name: decode_dot(rest, dot),
            exact,
            private,
        }
    }

    /// Encode back to the source directory name. The exact inverse of
    /// [`parse`](Self::parse); directory records have no invalid
    /// combinations.
    pub fn source_name(&self) -> String {
        let mut name = String::new();
        if self.exact {
            name.push_str(marker::EXACT);
        }
        if self.private {
            name.push_str(marker::PRIVATE);
        }
        name.push_str(&encode_dot(&self.name));
        name
    }

    /// Desired permission bits under the given umask.
    pub fn perm(&self, umask: u32) -> u32 {
        let mut perm = 0o777;
        if self.private {
            perm &= !0o077;
        }
        perm & !umask
    }
}

/// What kind of target a source file describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFileKind {
    /// A regular file
    File,
    /// A script executed on apply
    Script,
    /// A symlink whose source contents are the link target
    Symlink,
}

/// Decoded intent of a source file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    /// Target name, leading dot already applied
    pub name: String,

    pub kind: SourceFileKind,

    /// Permit writing an empty file; otherwise empty content means absent
    pub empty: bool,

    /// Execute permission bits set
    pub executable: bool,

    /// Script runs at most once per content hash
    pub once: bool,

    /// Permission bits restricted to the owner
    pub private: bool,

    /// Source contents are a template, rendered before use
    pub template: bool,

    /// Source contents are encrypted, decrypted before use
    pub encrypted: bool,
}

impl FileAttributes {
    /// Decode a source file name. Never fails; unrecognized markers stay
    /// in the name.
    pub fn parse(source_name: &str) -> Self {
        let mut attr = Self {
            name: String::new(),
            kind: SourceFileKind::File,
            empty: false,
            executable: false,
            once: false,
            private: false,
            template: false,
            encrypted: false,
        };

        if let (rest, true) = strip(source_name, marker::RUN) {
            attr.kind = SourceFileKind::Script;
            let (rest, once) = strip(rest, marker::ONCE);
            let (rest, template) = strip_template(rest);
            attr.once = once;
            attr.template = template;
            attr.name = rest.to_string();
        } else if let (rest, true) = strip(source_name, marker::SYMLINK) {
            attr.kind = SourceFileKind::Symlink;
            let (rest, dot) = strip(rest, marker::DOT);
            let (rest, template) = strip_template(rest);
            attr.template = template;
            attr.name = decode_dot(rest, dot);
        } else {
            let (rest, encrypted) = strip(source_name, marker::ENCRYPTED);
            let (rest, private) = strip(rest, marker::PRIVATE);
            let (rest, empty) = strip(rest, marker::EMPTY);
            let (rest, executable) = strip(rest, marker::EXECUTABLE);
            let (rest, dot) = strip(rest, marker::DOT);
            let (rest, template) = strip_template(rest);
            attr.encrypted = encrypted;
            attr.private = private;
            attr.empty = empty;
            attr.executable = executable;
            attr.template = template;
            attr.name = decode_dot(rest, dot);
        }

        attr
    }

    /// Encode back to the source file name.
    ///
    /// Fails for combinations with no encoding: `once` outside scripts,
    /// and any permission or content modifier on scripts or symlinks
    /// (scripts admit only `once` and `template`; symlinks only
    /// `template`).
    pub fn source_name(&self) -> Result<String> {
        match self.kind {
            SourceFileKind::Script => {
                if self.empty || self.executable || self.private || self.encrypted {
                    return Err(Error::unencodable(
                        &self.name,
                        "a script admits only the once and template attributes",
                    ));
                }
                let mut name = String::from(marker::RUN);
                if self.once {
                    name.push_str(marker::ONCE);
                }
                name.push_str(&self.name);
                if self.template {
                    name.push_str(marker::TEMPLATE_SUFFIX);
                }
                Ok(name)
            }
            SourceFileKind::Symlink => {
                if self.empty || self.executable || self.once || self.private || self.encrypted {
                    return Err(Error::unencodable(
                        &self.name,
                        "a symlink admits only the template attribute",
                    ));
                }
                let mut name = String::from(marker::SYMLINK);
                name.push_str(&encode_dot(&self.name));
                if self.template {
                    name.push_str(marker::TEMPLATE_SUFFIX);
                }
                Ok(name)
            }
            SourceFileKind::File => {
                if self.once {
                    return Err(Error::unencodable(
                        &self.name,
                        "only a script can run once",
                    ));
                }
                let mut name = String::new();
                if self.encrypted {
                    name.push_str(marker::ENCRYPTED);
                }
                if self.private {
                    name.push_str(marker::PRIVATE);
                }
                if self.empty {
                    name.push_str(marker::EMPTY);
                }
                if self.executable {
                    name.push_str(marker::EXECUTABLE);
                }
                name.push_str(&encode_dot(&self.name));
                if self.template {
                    name.push_str(marker::TEMPLATE_SUFFIX);
                }
                Ok(name)
            }
        }
    }

    /// Desired permission bits under the given umask.
    pub fn perm(&self, umask: u32) -> u32 {
        let mut perm = 0o666;
        if self.executable {
            perm |= 0o111;
        }
        if self.private {
            perm &= !0o077;
        }
        perm & !umask
    }
}

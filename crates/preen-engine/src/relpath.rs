//! Slash-separated relative target names

use std::path::{Path, PathBuf};

/// A relative target name, always slash-separated.
///
/// Used as the key of the target map and as the subject of all pattern
/// matching; ordering is plain lexicographic over the string form, which
/// puts every parent directory before its children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelPath {
    inner: String,
}

impl RelPath {
    /// Create a RelPath from a slash-separated name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { inner: name.into() }
    }

    /// The empty path, naming the target root itself.
    pub fn root() -> Self {
        Self {
            inner: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Append one name component.
    pub fn join(&self, name: &str) -> Self {
        if self.inner.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{}/{name}", self.inner))
        }
    }

    /// The parent path, `None` for the root and for single components.
    pub fn parent(&self) -> Option<Self> {
        self.inner.rfind('/').map(|idx| Self::new(&self.inner[..idx]))
    }

    /// The final name component.
    pub fn file_name(&self) -> &str {
        self.inner.rsplit('/').next().unwrap_or("")
    }

    /// Resolve against a target root directory.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in self.inner.split('/').filter(|c| !c.is_empty()) {
            path.push(component);
        }
        path
    }
}

impl std::fmt::Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

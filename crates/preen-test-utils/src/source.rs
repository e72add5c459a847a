//! [`TestTree`] builder for reconciliation test scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding a `source/` tree of encoded names and a
/// `target/` directory to reconcile, with helper methods for setup and
/// assertion.
///
/// # Example
///
/// ```rust,no_run
/// use preen_test_utils::TestTree;
///
/// let tree = TestTree::new();
/// tree.source_file("dot_bashrc", b"export EDITOR=vi\n");
/// tree.source_dir("exact_dot_config");
/// tree.assert_target_not_exists(".bashrc");
/// ```
pub struct TestTree {
    temp_dir: TempDir,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create the tempdir with empty `source/` and `target/` directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("source")).unwrap();
        fs::create_dir(temp_dir.path().join("target")).unwrap();
        Self { temp_dir }
    }

    /// The source tree root.
    pub fn source(&self) -> PathBuf {
        self.temp_dir.path().join("source")
    }

    /// The target directory root.
    pub fn target(&self) -> PathBuf {
        self.temp_dir.path().join("target")
    }

    /// A scratch path outside both trees (state files, markers).
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Write a file under `source/`, creating parent directories.
    pub fn source_file(&self, path: &str, contents: &[u8]) -> &Self {
        let full = self.source().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();
        self
    }

    /// Create a directory under `source/`.
    pub fn source_dir(&self, path: &str) -> &Self {
        fs::create_dir_all(self.source().join(path)).unwrap();
        self
    }

    /// Write a file under `target/`, creating parent directories.
    pub fn target_file(&self, path: &str, contents: &[u8]) -> &Self {
        let full = self.target().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, contents).unwrap();
        self
    }

    /// Create a directory under `target/`.
    pub fn target_dir(&self, path: &str) -> &Self {
        fs::create_dir_all(self.target().join(path)).unwrap();
        self
    }

    /// Assert that `path` (relative to `target/`) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_target_exists(&self, path: &str) {
        let full = self.target().join(path);
        assert!(
            full.symlink_metadata().is_ok(),
            "Expected target to exist: {}",
            full.display()
        );
    }

    /// Assert that `path` (relative to `target/`) does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_target_not_exists(&self, path: &str) {
        let full = self.target().join(path);
        assert!(
            full.symlink_metadata().is_err(),
            "Expected target NOT to exist: {}",
            full.display()
        );
    }

    /// Assert the exact contents of the file at `path` under `target/`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or differs from `contents`.
    pub fn assert_target_contents(&self, path: &str, contents: &[u8]) {
        let full = self.target().join(path);
        let actual = fs::read(&full)
            .unwrap_or_else(|_| panic!("Could not read target: {}", full.display()));
        assert_eq!(
            actual,
            contents,
            "Unexpected contents at {}",
            full.display()
        );
    }

    /// Assert that `path` under `target/` is a symlink to `linkname`.
    ///
    /// # Panics
    /// Panics if the path is not a symlink or points elsewhere.
    pub fn assert_target_symlink(&self, path: &str, linkname: &str) {
        let full = self.target().join(path);
        let actual = fs::read_link(&full)
            .unwrap_or_else(|_| panic!("Expected a symlink at {}", full.display()));
        assert_eq!(actual, Path::new(linkname));
    }

    /// Capture a recursive listing of `target/` as sorted relative paths.
    ///
    /// Handy for asserting a dry run changed nothing.
    pub fn target_snapshot(&self) -> Vec<String> {
        let mut paths = Vec::new();
        collect(&self.target(), &self.target(), &mut paths);
        paths.sort();
        paths
    }
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let file_type = entry.file_type().unwrap();
        out.push(rel);
        if file_type.is_dir() {
            collect(root, &path, out);
        }
    }
}

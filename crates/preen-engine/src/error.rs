//! Error types for preen-engine

use std::path::PathBuf;

use crate::relpath::RelPath;

/// Result type for preen-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// One target name claimed by more than one source entry.
#[derive(Debug)]
pub struct DuplicateTarget {
    /// Target name in conflict
    pub target: RelPath,
    /// Every source path that maps to it
    pub sources: Vec<PathBuf>,
}

/// Errors that can occur in preen-engine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source entry of a kind the engine cannot reconcile (device, socket,
    /// fifo, or a symlink inside the source tree)
    #[error("Unsupported file type at {path}")]
    UnsupportedFileType { path: PathBuf },

    /// Two or more source entries map to the same target name; aggregated
    /// across the whole tree before anything is applied
    #[error("Duplicate target names: {}", render_duplicates(duplicates))]
    DuplicateTargets { duplicates: Vec<DuplicateTarget> },

    /// Content production failed (read, decrypt, or render) for an entry
    #[error("Content for {name}: {message}")]
    Content { name: String, message: String },

    /// Template parse or render failure
    #[error("Template {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: Box<minijinja::Error>,
    },

    /// Malformed glob in an ignore or remove file
    #[error("Invalid pattern {pattern:?} in {file}: {source}")]
    InvalidPattern {
        file: PathBuf,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Attribute record with no valid source-name encoding
    #[error("Cannot encode attributes for {name}: {message}")]
    UnencodableAttributes { name: String, message: String },

    /// Malformed version marker file
    #[error("Invalid version in {path}: {source}")]
    InvalidVersion {
        path: PathBuf,
        #[source]
        source: semver::Error,
    },

    /// The source tree requires a newer version than the running binary
    #[error("Source requires version {required}, this is {current}")]
    SourceTooOld {
        required: semver::Version,
        current: semver::Version,
    },

    /// Target name not present in the source mapping
    #[error("Unknown target: {name}")]
    UnknownTarget { name: RelPath },

    /// Error from the capability layer
    #[error(transparent)]
    System(#[from] preen_system::Error),

    /// JSON serialization error (persisted run records, template data)
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn content(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Content {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn unencodable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnencodableAttributes {
            name: name.into(),
            message: message.into(),
        }
    }
}

fn render_duplicates(duplicates: &[DuplicateTarget]) -> String {
    duplicates
        .iter()
        .map(|d| {
            let sources = d
                .sources
                .iter()
                .map(|s| s.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} ({sources})", d.target)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

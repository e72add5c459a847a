//! Error types for preen-system

use std::path::PathBuf;
use std::process::ExitStatus;

/// Result type for preen-system operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in preen-system operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("Script {name} failed: {status}")]
    ScriptExit { name: String, status: ExitStatus },

    #[error("Invalid glob {pattern}: {message}")]
    Glob { pattern: String, message: String },

    #[error("State file {path}: {message}")]
    State { path: PathBuf, message: String },

    #[error("Encryption failed: {message}")]
    Encryption { message: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn state(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::State {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption {
            message: message.into(),
        }
    }

    /// Returns true if the underlying cause is a not-found I/O error.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

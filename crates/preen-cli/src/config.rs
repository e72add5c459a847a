//! TOML configuration loading

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use preen_system::{Encryption, GpgEncryption, NoEncryption};

use crate::error::{CliError, Result};

/// Configuration file contents, all fields optional.
///
/// Loaded from `~/.config/preen/preen.toml` unless `--config` names
/// another path; a missing default file means defaults throughout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source tree root, default `~/.local/share/preen`
    pub source_dir: Option<PathBuf>,

    /// Target directory, default the home directory
    pub target_dir: Option<PathBuf>,

    /// Umask as an octal string, default `"022"`
    pub umask: Option<String>,

    /// Persistent state file, default `~/.config/preen/preenstate.toml`
    pub state_file: Option<PathBuf>,

    /// GPG encryption settings
    pub gpg: GpgConfig,

    /// Free-form data handed to every template render
    pub data: toml::Table,
}

/// The `[gpg]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GpgConfig {
    /// Binary to invoke, default `gpg`
    pub command: Option<String>,

    /// Recipient for asymmetric encryption
    pub recipient: Option<String>,

    /// Use symmetric encryption
    pub symmetric: bool,
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicit `--config` path must exist; the default path may be
    /// absent, which yields the default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(CliError::user(format!(
                    "Cannot read config {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(toml::from_str(&contents)?)
    }

    /// Resolved source tree root.
    pub fn source_dir(&self) -> PathBuf {
        self.source_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("preen")
        })
    }

    /// Resolved target directory.
    pub fn target_dir(&self) -> PathBuf {
        self.target_dir
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolved state file path.
    pub fn state_file(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("preen")
                .join("preenstate.toml")
        })
    }

    /// Umask parsed from its octal string form.
    pub fn umask(&self) -> Result<u32> {
        match &self.umask {
            None => Ok(0o022),
            Some(text) => u32::from_str_radix(text, 8)
                .map_err(|_| CliError::user(format!("Invalid umask: {text:?}"))),
        }
    }

    /// Template data as JSON.
    pub fn template_data(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.data).map_err(preen_engine::Error::from)
            .map_err(CliError::from)
    }

    /// The configured encryption backend, `NoEncryption` when the `[gpg]`
    /// section is empty.
    pub fn encryption(&self) -> Arc<dyn Encryption> {
        let gpg = &self.gpg;
        if gpg.command.is_none() && gpg.recipient.is_none() && !gpg.symmetric {
            return Arc::new(NoEncryption);
        }
        Arc::new(GpgEncryption {
            command: gpg.command.clone().unwrap_or_else(|| "gpg".to_string()),
            recipient: gpg.recipient.clone(),
            symmetric: gpg.symmetric,
        })
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("preen")
        .join("preen.toml")
}

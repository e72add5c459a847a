//! Encryption backend seam
//!
//! The engine only ever needs the four operations on the [`Encryption`]
//! trait; the GPG implementation shells out to an external binary with
//! inherited standard streams so pinentry can prompt.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::debug;

use crate::{Error, Result};

/// Encryption backend contract.
pub trait Encryption: Send + Sync {
    /// Decrypt a ciphertext. `hint_name` names the source entry for error
    /// reporting and for backends that key decryption on a file name.
    fn decrypt(&self, hint_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a ciphertext into a private temporary file.
    ///
    /// The returned guard removes the plaintext on drop, so it is cleaned
    /// up on every exit path of the caller.
    fn decrypt_to_file(&self, hint_name: &str, ciphertext: &[u8]) -> Result<DecryptedFile>;

    /// Encrypt a plaintext.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt the contents of a file.
    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>>;
}

/// A decrypted plaintext staged in a private temporary directory.
///
/// Dropping the guard removes the directory and the plaintext with it.
/// Call [`close`](DecryptedFile::close) on the success path to surface
/// removal errors instead of discarding them.
pub struct DecryptedFile {
    path: PathBuf,
    dir: TempDir,
}

impl DecryptedFile {
    /// Build a guard around a plaintext file living inside `dir`.
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { path, dir }
    }

    /// Path to the plaintext file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the plaintext now, reporting any failure.
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.dir.close().map_err(|e| Error::io(path, e))
    }
}

/// Encryption through an external `gpg` binary.
///
/// Ciphertexts are ASCII-armored. Standard streams are inherited so the
/// agent/pinentry flow works the same as invoking gpg by hand.
pub struct GpgEncryption {
    /// Binary to invoke, normally `"gpg"`
    pub command: String,

    /// Recipient for asymmetric encryption
    pub recipient: Option<String>,

    /// Use symmetric encryption instead of a recipient
    pub symmetric: bool,
}

impl GpgEncryption {
    fn run(&self, args: &[&str]) -> Result<()> {
        debug!(command = %self.command, ?args, "gpg");
        let status = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::Command {
                command: self.command.clone(),
                message: e.to_string(),
            })?;
        if !status.success() {
            return Err(Error::Command {
                command: self.command.clone(),
                message: status.to_string(),
            });
        }
        Ok(())
    }

    fn encrypt_args<'a>(&'a self, output: &'a str, input: &'a str) -> Result<Vec<&'a str>> {
        let mut args = vec!["--armor", "--output", output];
        if self.symmetric {
            args.push("--symmetric");
        } else if let Some(recipient) = &self.recipient {
            args.extend(["--recipient", recipient, "--encrypt"]);
        } else {
            return Err(Error::encryption(
                "gpg encryption requires a recipient or symmetric mode",
            ));
        }
        args.push(input);
        Ok(args)
    }
}

impl Encryption for GpgEncryption {
    fn decrypt(&self, hint_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let plaintext = self.decrypt_to_file(hint_name, ciphertext)?;
        let contents = fs::read(plaintext.path()).map_err(|e| Error::io(plaintext.path(), e))?;
        plaintext.close()?;
        Ok(contents)
    }

    fn decrypt_to_file(&self, hint_name: &str, ciphertext: &[u8]) -> Result<DecryptedFile> {
        let dir = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let cipher_path = dir.path().join(format!("{hint_name}.asc"));
        let plain_path = dir.path().join(hint_name);
        fs::write(&cipher_path, ciphertext).map_err(|e| Error::io(&cipher_path, e))?;

        self.run(&[
            "--output",
            &plain_path.to_string_lossy(),
            "--decrypt",
            &cipher_path.to_string_lossy(),
        ])?;

        Ok(DecryptedFile::new(dir, plain_path))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let dir = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let plain_path = dir.path().join("plaintext");
        fs::write(&plain_path, plaintext).map_err(|e| Error::io(&plain_path, e))?;
        let ciphertext = self.encrypt_file(&plain_path)?;
        dir.close().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        Ok(ciphertext)
    }

    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        let dir = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let cipher_path = dir.path().join("ciphertext.asc");

        let cipher_str = cipher_path.to_string_lossy().into_owned();
        let input_str = path.to_string_lossy().into_owned();
        let args = self.encrypt_args(&cipher_str, &input_str)?;
        self.run(&args)?;

        let ciphertext = fs::read(&cipher_path).map_err(|e| Error::io(&cipher_path, e))?;
        dir.close().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        Ok(ciphertext)
    }
}

/// The configured-off default: every operation fails with a clear message.
pub struct NoEncryption;

impl Encryption for NoEncryption {
    fn decrypt(&self, hint_name: &str, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::encryption(format!(
            "no encryption backend configured, cannot decrypt {hint_name}"
        )))
    }

    fn decrypt_to_file(&self, hint_name: &str, _ciphertext: &[u8]) -> Result<DecryptedFile> {
        Err(Error::encryption(format!(
            "no encryption backend configured, cannot decrypt {hint_name}"
        )))
    }

    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::encryption("no encryption backend configured"))
    }

    fn encrypt_file(&self, _path: &Path) -> Result<Vec<u8>> {
        Err(Error::encryption("no encryption backend configured"))
    }
}

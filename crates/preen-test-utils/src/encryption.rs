//! XOR "encryption" for tests that need the encrypted-entry path without
//! an external gpg binary.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use preen_system::{DecryptedFile, Encryption, Error, Result};

/// Symmetric XOR cipher. Trivially breakable, which is fine: tests only
/// need ciphertext that differs from plaintext and round-trips.
pub struct XorEncryption {
    key: u8,
}

impl XorEncryption {
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    fn apply(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|b| b ^ self.key).collect()
    }
}

impl Default for XorEncryption {
    fn default() -> Self {
        Self::new(0x5a)
    }
}

impl Encryption for XorEncryption {
    fn decrypt(&self, _hint_name: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(self.apply(ciphertext))
    }

    fn decrypt_to_file(&self, hint_name: &str, ciphertext: &[u8]) -> Result<DecryptedFile> {
        let dir = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let path = dir.path().join(hint_name);
        fs::write(&path, self.apply(ciphertext)).map_err(|e| Error::io(&path, e))?;
        Ok(DecryptedFile::new(dir, path))
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(self.apply(plaintext))
    }

    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        let plaintext = fs::read(path).map_err(|e| Error::io(path, e))?;
        self.encrypt(&plaintext)
    }
}

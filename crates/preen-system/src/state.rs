//! Persistent key-value state, keyed by `(bucket, key)` byte strings

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use fs2::FileExt;

use crate::{Error, Result};

/// The read/write contract of the persistent state store.
///
/// Buckets, keys, and values are arbitrary byte strings; the storage
/// engine behind them is an implementation detail.
pub trait PersistentState: Send + Sync {
    /// Read a value, `None` when the bucket or key is absent.
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Write a value, creating the bucket if needed.
    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()>;
}

/// Buckets, keys, and values hex-encoded into a TOML table so arbitrary
/// byte strings survive the round trip. Not meant to be hand-edited.
type StateDoc = BTreeMap<String, BTreeMap<String, String>>;

/// File-backed state store.
///
/// All access serializes on an advisory lock held on a sidecar lock file
/// next to the document: reads take it shared, read-modify-write takes it
/// exclusive across the whole load, edit, temp-write, and rename. The
/// lock lives on its own file because the document itself is replaced by
/// rename, and a lock on a replaced inode no longer excludes anyone.
/// The files are created lazily on first write; a missing document reads
/// as empty.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store persisted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("toml.lock")
    }

    fn open_lock(&self) -> Result<Option<File>> {
        match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
        {
            Ok(file) => Ok(Some(file)),
            // Parent directory absent: nothing was ever written
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(self.lock_path(), e)),
        }
    }

    fn read_doc(&self) -> Result<StateDoc> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| Error::state(&self.path, e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateDoc::new()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }

    fn load(&self) -> Result<StateDoc> {
        let Some(lock) = self.open_lock()? else {
            return Ok(StateDoc::new());
        };
        lock.lock_shared().map_err(|e| Error::io(self.lock_path(), e))?;
        self.read_doc()
        // Lock released when the handle is dropped
    }

    fn mutate(&self, f: impl FnOnce(&mut StateDoc)) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let lock = self
            .open_lock()?
            .ok_or_else(|| Error::state(&self.path, "state directory is not accessible"))?;
        lock.lock_exclusive()
            .map_err(|e| Error::io(self.lock_path(), e))?;

        let mut doc = self.read_doc()?;
        f(&mut doc);

        let content =
            toml::to_string_pretty(&doc).map_err(|e| Error::state(&self.path, e.to_string()))?;
        let temp_path = self.path.with_extension("toml.tmp");
        fs::write(&temp_path, &content).map_err(|e| Error::io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| Error::io(&self.path, e))?;

        // Lock released when the handle is dropped
        Ok(())
    }
}

impl PersistentState for FileStateStore {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        let doc = self.load()?;
        let Some(bucket) = doc.get(&hex_encode(bucket)) else {
            return Ok(None);
        };
        match bucket.get(&hex_encode(key)) {
            Some(value) => Ok(Some(hex_decode(value).map_err(|message| {
                Error::state(&self.path, message)
            })?)),
            None => Ok(None),
        }
    }

    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.mutate(|doc| {
            doc.entry(hex_encode(bucket))
                .or_default()
                .insert(hex_encode(key), hex_encode(value));
        })
    }

    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        self.mutate(|doc| {
            if let Some(entries) = doc.get_mut(&hex_encode(bucket)) {
                entries.remove(&hex_encode(key));
                if entries.is_empty() {
                    doc.remove(&hex_encode(bucket));
                }
            }
        })
    }
}

/// In-memory state store for tests and embedding.
#[derive(Default)]
pub struct MemoryStateStore {
    buckets: Mutex<BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentState for MemoryStateStore {
    fn get(&self, bucket: &[u8], key: &[u8]) -> Result<Option<Vec<u8>>> {
        let buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(buckets.get(bucket).and_then(|b| b.get(key)).cloned())
    }

    fn set(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        buckets
            .entry(bucket.to_vec())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<()> {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entries) = buckets.get_mut(bucket) {
            entries.remove(key);
        }
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hex_decode(text: &str) -> std::result::Result<Vec<u8>, String> {
    if text.len() % 2 != 0 {
        return Err(format!("odd-length hex value: {text:?}"));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| format!("invalid hex value: {text:?}"))
        })
        .collect()
}

//! Memoizing deferred content evaluation
//!
//! Template execution and decryption are expensive and can fail, so entry
//! contents are modeled as thunks that run at most once. Both outcomes
//! are memoized: a validation pass and an apply pass forcing the same
//! cell share one producer run, and a failure replays as the same
//! content error.

use std::sync::{Arc, Mutex, PoisonError};

use preen_system::System;

use crate::{Error, Result};

/// Producer for deferred byte content. Receives the capability surface so
/// source reads stay observable by decorators.
pub type ContentProducer = Box<dyn FnOnce(&dyn System) -> Result<Vec<u8>> + Send>;

enum Cell {
    Pending(Option<ContentProducer>),
    Ready(Arc<[u8]>),
    Failed(String),
}

/// Deferred, memoized byte content for one source entry.
///
/// Cloning is cheap and shares the memo, so every consumer of an entry
/// sees the same single producer run.
#[derive(Clone)]
pub struct LazyContents {
    /// Entry name used in content errors
    name: String,
    cell: Arc<Mutex<Cell>>,
}

impl LazyContents {
    /// Wrap a producer; `name` identifies the entry in error messages.
    pub fn new(name: impl Into<String>, producer: ContentProducer) -> Self {
        Self {
            name: name.into(),
            cell: Arc::new(Mutex::new(Cell::Pending(Some(producer)))),
        }
    }

    /// Wrap already-known bytes.
    pub fn ready(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            cell: Arc::new(Mutex::new(Cell::Ready(bytes.into().into()))),
        }
    }

    /// Force the cell, running the producer on first call only.
    pub fn bytes(&self, system: &dyn System) -> Result<Arc<[u8]>> {
        let mut cell = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        if let Cell::Pending(producer) = &mut *cell {
            // A producer can only be missing if a previous run panicked
            // mid-evaluation; treat that as a failure, not a retry.
            *cell = match producer.take() {
                Some(producer) => match producer(system) {
                    Ok(bytes) => Cell::Ready(bytes.into()),
                    Err(e) => Cell::Failed(e.to_string()),
                },
                None => Cell::Failed("content evaluation did not complete".to_string()),
            };
        }
        match &*cell {
            Cell::Ready(bytes) => Ok(Arc::clone(bytes)),
            Cell::Failed(message) => Err(Error::content(&self.name, message.clone())),
            Cell::Pending(_) => unreachable!("cell resolved above"),
        }
    }
}

impl std::fmt::Debug for LazyContents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyContents")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Deferred, memoized symlink target.
#[derive(Debug, Clone)]
pub struct LazyLinkname {
    contents: LazyContents,
}

impl LazyLinkname {
    pub fn new(contents: LazyContents) -> Self {
        Self { contents }
    }

    /// Force the linkname. The bytes are used verbatim: no trimming, and
    /// an empty or non-UTF-8 linkname is a content error.
    pub fn linkname(&self, system: &dyn System) -> Result<String> {
        let bytes = self.contents.bytes(system)?;
        let linkname = std::str::from_utf8(&bytes)
            .map_err(|_| Error::content(&self.contents.name, "symlink target is not valid UTF-8"))?;
        if linkname.is_empty() {
            return Err(Error::content(&self.contents.name, "symlink target is empty"));
        }
        Ok(linkname.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use preen_system::{MemoryStateStore, RealSystem};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn system() -> RealSystem {
        RealSystem::new(Box::new(MemoryStateStore::new()))
    }

    #[test]
    fn producer_runs_at_most_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let cell = LazyContents::new(
            "entry",
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(b"contents".to_vec())
            }),
        );

        let system = system();
        assert_eq!(&*cell.bytes(&system).unwrap(), b"contents");
        assert_eq!(&*cell.bytes(&system).unwrap(), b"contents");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_memoized_and_replayed() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let cell = LazyContents::new(
            "entry",
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Err(Error::content("entry", "decryption failed"))
            }),
        );

        let system = system();
        let first = cell.bytes(&system).unwrap_err().to_string();
        let second = cell.bytes(&system).unwrap_err().to_string();
        assert_eq!(first, second);
        assert!(first.contains("decryption failed"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_memo() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let cell = LazyContents::new(
            "entry",
            Box::new(move |_| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(b"once".to_vec())
            }),
        );
        let clone = cell.clone();

        let system = system();
        cell.bytes(&system).unwrap();
        clone.bytes(&system).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ready_cell_needs_no_producer() {
        let cell = LazyContents::ready("entry", b"bytes".to_vec());
        assert_eq!(&*cell.bytes(&system()).unwrap(), b"bytes");
    }

    #[test]
    fn empty_linkname_is_a_content_error() {
        let linkname = LazyLinkname::new(LazyContents::ready("link", Vec::new()));
        let err = linkname.linkname(&system()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn linkname_is_used_verbatim() {
        let linkname = LazyLinkname::new(LazyContents::ready("link", b"target\n".to_vec()));
        assert_eq!(linkname.linkname(&system()).unwrap(), "target\n");
    }
}

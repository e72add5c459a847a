//! Reconciliation engine for Preen
//!
//! Decodes a source tree whose filenames encode intent into a
//! deduplicated target mapping, and reconciles a target directory to
//! match it through the `System` capability surface.

pub mod attr;
pub mod error;
pub mod lazy;
pub mod pattern;
pub mod relpath;
pub mod source;
pub mod target;
pub mod template;

pub use attr::{DirAttributes, FileAttributes, SourceFileKind};
pub use error::{DuplicateTarget, Error, Result};
pub use lazy::{ContentProducer, LazyContents, LazyLinkname};
pub use pattern::PatternSet;
pub use relpath::RelPath;
pub use source::{SourceState, SourceStateEntry, IGNORE_FILE, REMOVE_FILE, TEMPLATES_DIR, VERSION_FILE};
pub use target::{ActualState, ScriptRunRecord, TargetStateEntry, SCRIPT_STATE_BUCKET};
pub use template::Templates;

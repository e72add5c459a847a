//! System abstraction for Preen
//!
//! Exposes the `System` capability trait through which all filesystem,
//! process, and persistent-state access flows, the real operating-system
//! backend, and the dry-run and mutation-canary decorators.

pub mod canary;
pub mod dryrun;
pub mod encryption;
pub mod error;
pub mod real;
pub mod state;
pub mod system;
pub mod walk;

pub use canary::CanarySystem;
pub use dryrun::DryRunSystem;
pub use encryption::{DecryptedFile, Encryption, GpgEncryption, NoEncryption};
pub use error::{Error, Result};
pub use real::RealSystem;
pub use state::{FileStateStore, MemoryStateStore, PersistentState};
pub use system::{DirEntry, System};
pub use walk::{walk, WalkAction};

//! Shared test helpers for the Preen workspace
//!
//! [`TestTree`] builds encoded source trees and target directories inside
//! a tempdir; [`XorEncryption`] is an encryption backend that needs no
//! external binary.

pub mod encryption;
pub mod source;

pub use encryption::XorEncryption;
pub use source::TestTree;

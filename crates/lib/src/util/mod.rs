//! Shared utilities.
//!
//! Content hashing plus test helpers.

pub mod hash;

#[cfg(all(test, unix))]
pub mod testutil;

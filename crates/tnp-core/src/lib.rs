//! # tnp-core
//!
//! Shared error type for the tag-and-probe datacard builder crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{Error, Result};

/// Workspace version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Common utilities for factfind
//!
//! Shared code used across all factfind crates.

pub mod error;

pub use error::{Error, Result};

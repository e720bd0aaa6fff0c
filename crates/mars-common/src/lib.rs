//! Mars Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and logging for the Mars raw image loader.
//!
//! # Overview
//!
//! - **Types**: the JPL manifest and catalog documents, the normalized image
//!   row written to storage, and the result of an import run
//! - **Logging**: tracing subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use mars_common::types::Manifest;
//!
//! fn count_sols(json: &str) -> anyhow::Result<usize> {
//!     let manifest: Manifest = serde_json::from_str(json)?;
//!     Ok(manifest.len())
//! }
//! ```

pub mod logging;
pub mod types;

// Re-export commonly used types
pub use types::{Catalog, ImportResult, InstrumentGroup, Manifest, MarsImage, RawImage, SolRef};

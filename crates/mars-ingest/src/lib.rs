//! Mars Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads Curiosity raw image metadata from the JPL manifest into storage.
//!
//! # Pipeline
//!
//! - **Range**: resolve a possibly negative sol range against the manifest
//! - **Source**: fetch the manifest and per-sol catalogs over HTTP
//! - **Normalize**: drop thumbnails, secure locators, parse sols
//! - **Sink**: idempotent image writes (PostgreSQL or in memory)
//! - **Orchestrator**: fan out one task per sol and one per image, then join
//!
//! # Example
//!
//! ```no_run
//! use mars_ingest::{ImportConfig, ImportOrchestrator, JplClient, MemoryImageSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::new().with_range(-3, -1);
//!     let client = Arc::new(JplClient::from_config(&config)?);
//!     let sink = Arc::new(MemoryImageSink::new());
//!
//!     let result = ImportOrchestrator::with_source(config, client, sink).run().await?;
//!     println!("imported {} images", result.count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod range;
pub mod sink;
pub mod source;
pub mod store;

pub use config::{DatabaseConfig, ImportConfig};
pub use error::{ConfigError, FetchError, ImportError, StoreError, WriteError};
pub use orchestrator::ImportOrchestrator;
pub use range::{ResolvedRange, SolRange};
pub use sink::{ImageSink, MemoryImageSink, WriteOutcome};
pub use source::{CatalogSource, JplClient, ManifestSource};
pub use store::PgImageStore;

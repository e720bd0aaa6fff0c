//! Error types for the image loader
//!
//! Only a manifest failure, a bad range or bad configuration stop a run.
//! Catalog and write failures are logged by the task that hit them and
//! never reach the caller.

use thiserror::Error;

/// Retrieving the manifest or a sol catalog failed
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Location that failed, when the error is tied to one
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Client(_) => None,
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Decode { url, .. } => Some(url),
        }
    }
}

/// The sink refused an image for a reason other than a duplicate key
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Database write failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Required settings are missing or malformed
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Schema management and read queries against the image table
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that abort an import run
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to fetch manifest: {0}")]
    Manifest(#[source] FetchError),

    #[error("Sol index {index} is out of bounds for a manifest of {total} sols")]
    RangeOutOfBounds { index: i64, total: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

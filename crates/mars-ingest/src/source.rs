//! Manifest and catalog sources
//!
//! The orchestrator only sees the [`ManifestSource`] and [`CatalogSource`]
//! traits. [`JplClient`] implements both over HTTP.

use async_trait::async_trait;
use mars_common::types::{Catalog, Manifest};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::config::ImportConfig;
use crate::error::FetchError;

/// Provides the manifest of every published sol
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch_manifest(&self) -> Result<Manifest, FetchError>;
}

/// Provides the image catalog of one sol
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_catalog(&self, catalog_url: &str) -> Result<Catalog, FetchError>;
}

/// HTTP client for the JPL raw image manifest and catalogs
#[derive(Debug, Clone)]
pub struct JplClient {
    client: Client,
    manifest_url: String,
}

impl JplClient {
    pub fn new(manifest_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            manifest_url: manifest_url.into(),
        })
    }

    pub fn from_config(config: &ImportConfig) -> Result<Self, FetchError> {
        Self::new(
            config.manifest_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    /// GET `url` and decode the JSON body.
    ///
    /// The body is read in full before decoding so a malformed document is
    /// reported as [`FetchError::Decode`] rather than a transport error.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        debug!(url = %url, bytes = body.len(), "Fetched document");

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl ManifestSource for JplClient {
    async fn fetch_manifest(&self) -> Result<Manifest, FetchError> {
        self.get_json(&self.manifest_url).await
    }
}

#[async_trait]
impl CatalogSource for JplClient {
    async fn fetch_catalog(&self, catalog_url: &str) -> Result<Catalog, FetchError> {
        self.get_json(catalog_url).await
    }
}

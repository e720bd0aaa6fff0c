//! Shared helpers for mars-ingest integration tests
//!
//! - wiremock documents shaped like the JPL manifest and catalogs
//! - a PostgreSQL container for store tests (requires Docker)

#![allow(dead_code)]

use anyhow::{Context, Result};
use mars_ingest::{DatabaseConfig, PgImageStore};
use serde_json::{json, Value};
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,mars_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

// ============================================================================
// JPL documents
// ============================================================================

pub fn catalog_path(sol: i64) -> String {
    format!("/msl-raw-images/image/images_sol{}.json", sol)
}

/// Manifest listing `sols`, each pointing at `catalog_path` on `base_url`
pub fn manifest_json(base_url: &str, sols: &[i64]) -> Value {
    let sols: Vec<Value> = sols
        .iter()
        .map(|sol| {
            json!({
                "sol": sol,
                "num_images": 3,
                "last_updated": "2016-06-10T03:12:44Z",
                "catalog_url": format!("{}{}", base_url, catalog_path(*sol)),
            })
        })
        .collect();

    json!({
        "mission": "msl",
        "type": "mission-manifest",
        "most_recent": "2016-06-10T03:12:44Z",
        "sols": sols,
    })
}

/// One raw record as the catalog publishes it
pub fn record(sol: i64, item_name: &str, sample_type: &str, instrument: &str) -> Value {
    json!({
        "itemName": item_name,
        "url": format!(
            "http://mars.jpl.nasa.gov/msl-raw-images/proj/msl/redops/ods/surface/sol/{:05}/{}.JPG",
            sol, item_name
        ),
        "sampleType": sample_type,
        "instrument": instrument,
        "lmst": format!("Sol-{:05}M15:22:41.000", sol),
        "sol": sol.to_string(),
        "utc": format!("2016-06-{:02}T08:03:38.000Z", 1 + sol % 28),
        "filterName": "NONE",
    })
}

/// Catalog with `full` full-resolution records and one thumbnail
pub fn catalog_json(sol: i64, full: usize) -> Value {
    let mut images: Vec<Value> = (0..full)
        .map(|n| record(sol, &format!("NLB_{}_{:03}", sol, n), "full", "NAV_LEFT_B"))
        .collect();
    images.push(record(sol, &format!("NLB_{}_THM", sol), "thumbnail", "NAV_LEFT_B"));

    json!({
        "sol": sol,
        "type": "sol-catalog",
        "most_recent": "2016-06-10T03:12:44Z",
        "images": images,
    })
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    config: DatabaseConfig,
    store: PgImageStore,
}

impl TestPostgres {
    /// Start a container and create the image table
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DatabaseConfig::new("postgres")
            .with_connection(format!("{}:{}", host, port))
            .with_password("postgres")
            .with_database("postgres")
            .with_max_connections(8);

        let store = PgImageStore::connect(&config)
            .await
            .context("Failed to connect to PostgreSQL")?;
        store.ensure_schema().await.context("Failed to create schema")?;

        Ok(Self {
            _container: container,
            config,
            store,
        })
    }

    pub fn store(&self) -> &PgImageStore {
        &self.store
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

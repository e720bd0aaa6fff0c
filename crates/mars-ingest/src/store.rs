//! PostgreSQL image store
//!
//! One table, `images`, keyed by `item_name`. Writes use
//! `ON CONFLICT (item_name) DO NOTHING` so re-importing a sol never
//! duplicates rows; the affected row count tells a new row from an ignored
//! duplicate.

use async_trait::async_trait;
use mars_common::types::{InstrumentGroup, MarsImage};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{StoreError, WriteError};
use crate::sink::{ImageSink, WriteOutcome};

/// Default number of rows returned by [`PgImageStore::recent_images`].
pub const DEFAULT_RECENT_LIMIT: i64 = 64;

const DROP_TABLE_SQL: &str = "DROP TABLE IF EXISTS images";

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS images (
        instrument VARCHAR(32),
        item_name VARCHAR(100) PRIMARY KEY,
        lmst VARCHAR(32),
        sol BIGINT,
        url VARCHAR(255),
        utc TEXT
    )
"#;

const CREATE_UTC_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS images_utc_idx ON images (utc)";

const CREATE_SOL_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS images_sol_idx ON images (sol)";

const INSERT_IMAGE_SQL: &str = r#"
    INSERT INTO images (instrument, item_name, lmst, sol, url, utc)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (item_name) DO NOTHING
"#;

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    instrument: Option<String>,
    item_name: String,
    lmst: Option<String>,
    sol: Option<i64>,
    url: Option<String>,
    utc: Option<String>,
}

impl From<ImageRow> for MarsImage {
    fn from(row: ImageRow) -> Self {
        Self {
            instrument: row.instrument.unwrap_or_default(),
            item_name: row.item_name,
            lmst: row.lmst.unwrap_or_default(),
            sol: row.sol.unwrap_or(mars_common::types::UNKNOWN_SOL),
            url: row.url.unwrap_or_default(),
            utc: row.utc.unwrap_or_default(),
        }
    }
}

/// Image table backed by a shared connection pool
#[derive(Debug, Clone)]
pub struct PgImageStore {
    pool: PgPool,
}

impl PgImageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Validate `config` and open a pool sized for concurrent image writes.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = config.connect_options()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await?;

        info!(
            connection = %config.connection,
            database = %config.database,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table and its indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in [CREATE_TABLE_SQL, CREATE_UTC_INDEX_SQL, CREATE_SOL_INDEX_SQL] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!("Image table ready");
        Ok(())
    }

    /// Drop the table with all its rows, then create it again.
    pub async fn recreate_schema(&self) -> Result<(), StoreError> {
        warn!("Dropping existing image table");
        let mut tx = self.pool.begin().await?;
        sqlx::query(DROP_TABLE_SQL).execute(&mut *tx).await?;
        for statement in [CREATE_TABLE_SQL, CREATE_UTC_INDEX_SQL, CREATE_SOL_INDEX_SQL] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Image table recreated");
        Ok(())
    }

    /// Newest images of an instrument group, by UTC descending.
    pub async fn recent_images(
        &self,
        group: InstrumentGroup,
        limit: i64,
    ) -> Result<Vec<MarsImage>, StoreError> {
        let instruments = group.instruments();

        let rows: Vec<ImageRow> = if instruments.is_empty() {
            sqlx::query_as(
                r#"
                SELECT instrument, item_name, lmst, sol, url, utc
                FROM images
                ORDER BY utc DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            let instruments: Vec<String> = instruments.iter().map(|s| s.to_string()).collect();
            sqlx::query_as(
                r#"
                SELECT instrument, item_name, lmst, sol, url, utc
                FROM images
                WHERE instrument = ANY($1)
                ORDER BY utc DESC
                LIMIT $2
                "#,
            )
            .bind(instruments)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(rows.into_iter().map(MarsImage::from).collect())
    }

    pub async fn count_images(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ImageSink for PgImageStore {
    async fn insert_image(&self, image: &MarsImage) -> Result<WriteOutcome, WriteError> {
        let result = sqlx::query(INSERT_IMAGE_SQL)
            .bind(&image.instrument)
            .bind(&image.item_name)
            .bind(&image.lmst)
            .bind(image.sol)
            .bind(&image.url)
            .bind(&image.utc)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(WriteOutcome::AlreadyPresent)
        } else {
            Ok(WriteOutcome::Inserted)
        }
    }
}

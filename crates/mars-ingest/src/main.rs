//! Mars Ingest - raw image metadata loader

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mars_common::logging::{init_logging, LogConfig, LogLevel};
use mars_common::types::InstrumentGroup;
use mars_ingest::config::{DEFAULT_DB_CONNECTION, DEFAULT_DB_NAME, DEFAULT_MANIFEST_URL};
use mars_ingest::store::DEFAULT_RECENT_LIMIT;
use mars_ingest::{
    DatabaseConfig, ImageSink, ImportConfig, ImportOrchestrator, JplClient, MemoryImageSink,
    PgImageStore,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mars-ingest")]
#[command(author, version, about = "Load Curiosity raw image metadata into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a range of sols from the manifest
    Import {
        /// First manifest index, negative counts from the latest sol
        #[arg(long, default_value_t = -10, allow_negative_numbers = true)]
        start: i64,

        /// Last manifest index, inclusive
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        end: i64,

        /// Drop and recreate the image table first
        #[arg(long, conflicts_with = "dry_run")]
        drop: bool,

        /// Import into memory instead of the database
        #[arg(long)]
        dry_run: bool,

        /// Cap on concurrent catalog fetches
        #[arg(long)]
        max_fetches: Option<usize>,

        /// Cap on concurrent image writes
        #[arg(long)]
        max_writes: Option<usize>,

        #[arg(long, env = "MARS_MANIFEST_URL", default_value = DEFAULT_MANIFEST_URL)]
        manifest_url: String,

        #[command(flatten)]
        db: ConnectionArgs,
    },

    /// Create the image table
    Schema {
        /// Drop the existing table and its rows first
        #[arg(long)]
        drop: bool,

        #[command(flatten)]
        db: ConnectionArgs,
    },

    /// Print the newest stored images
    Recent {
        /// latest, mahli, mastcam, navcam, hazcam or chemcam
        #[arg(short, long, default_value_t = InstrumentGroup::Latest)]
        group: InstrumentGroup,

        #[arg(
            short,
            long,
            default_value_t = DEFAULT_RECENT_LIMIT,
            value_parser = clap::value_parser!(i64).range(1..)
        )]
        limit: i64,

        #[command(flatten)]
        db: ConnectionArgs,
    },
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Database `host:port`
    #[arg(long, env = "MARS_DB_CONNECTION", default_value = DEFAULT_DB_CONNECTION)]
    connection: String,

    #[arg(long, env = "MARS_DB_USER")]
    user: Option<String>,

    #[arg(long, env = "MARS_DB_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    #[arg(long, env = "MARS_DB_NAME", default_value = DEFAULT_DB_NAME)]
    database: String,
}

impl ConnectionArgs {
    fn into_config(self) -> Result<DatabaseConfig> {
        let config = DatabaseConfig::new(self.user.unwrap_or_default())
            .with_connection(self.connection)
            .with_password(self.password)
            .with_database(self.database);
        config.validate().context("Invalid database settings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("mars-ingest")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    match cli.command {
        Command::Import {
            start,
            end,
            drop,
            dry_run,
            max_fetches,
            max_writes,
            manifest_url,
            db,
        } => {
            let mut config = ImportConfig::new()
                .with_range(start, end)
                .with_manifest_url(manifest_url);
            config.max_concurrent_fetches = max_fetches;
            config.max_concurrent_writes = max_writes;
            config.validate().context("Invalid import settings")?;

            let sink: Arc<dyn ImageSink> = if dry_run {
                info!("Dry run, images are kept in memory");
                Arc::new(MemoryImageSink::new())
            } else {
                // Settings are checked before the manifest is fetched
                let db = db.into_config()?;
                let store = PgImageStore::connect(&db).await?;
                if drop {
                    store.recreate_schema().await?;
                } else {
                    store.ensure_schema().await?;
                }
                Arc::new(store)
            };

            let client = Arc::new(JplClient::from_config(&config)?);
            info!(manifest_url = %client.manifest_url(), "Fetching manifest");
            let result = ImportOrchestrator::with_source(config, client, sink)
                .run()
                .await?;

            info!(
                count = result.count,
                inserted = result.inserted,
                batches_failed = result.batches_failed,
                records_failed = result.records_failed,
                "Import complete"
            );
        },
        Command::Schema { drop, db } => {
            let store = PgImageStore::connect(&db.into_config()?).await?;
            if drop {
                store.recreate_schema().await?;
            } else {
                store.ensure_schema().await?;
            }
        },
        Command::Recent { group, limit, db } => {
            let store = PgImageStore::connect(&db.into_config()?).await?;
            let images = store.recent_images(group, limit).await?;
            let now = chrono::Utc::now();

            for image in &images {
                let age = image
                    .hours_since(now)
                    .map(|hours| format!("{} hours ago", hours))
                    .unwrap_or_else(|| "unknown time".to_string());
                println!(
                    "sol {:>5}  {:<14} {:<40} {}  {}",
                    image.sol, image.instrument, image.item_name, age, image.url
                );
            }
            info!(group = %group, "Listed {} images", images.len());
        },
    }

    Ok(())
}

//! Import and database configuration
//!
//! Both structs are built and validated once at startup, then handed to the
//! orchestrator and the store. Nothing reads the environment mid-run.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;
use crate::range::SolRange;

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Curiosity raw image manifest published by JPL.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://mars.jpl.nasa.gov/msl-raw-images/image/image_manifest.json";

/// First sol to import; negative values count back from the latest sol.
pub const DEFAULT_START: i64 = -10;

/// Last sol to import; -1 is the latest sol.
pub const DEFAULT_END: i64 = -1;

/// Per-request HTTP timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default `host:port` of the PostgreSQL server.
pub const DEFAULT_DB_CONNECTION: &str = "127.0.0.1:5432";

/// Port used when the connection string has no `:port` suffix.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default database name.
pub const DEFAULT_DB_NAME: &str = "mars-images";

/// Default pool acquire timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Import run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// First manifest index, inclusive
    pub start: i64,

    /// Last manifest index, inclusive
    pub end: i64,

    pub manifest_url: String,

    pub request_timeout_secs: u64,

    /// Cap on in-flight catalog fetches (None = unbounded)
    pub max_concurrent_fetches: Option<usize>,

    /// Cap on in-flight image writes (None = unbounded)
    pub max_concurrent_writes: Option<usize>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_START,
            end: DEFAULT_END,
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_fetches: None,
            max_concurrent_writes: None,
        }
    }
}

impl ImportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sol range
    pub fn with_range(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Bound concurrent catalog fetches
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = Some(limit);
        self
    }

    /// Bound concurrent image writes
    pub fn with_max_concurrent_writes(mut self, limit: usize) -> Self {
        self.max_concurrent_writes = Some(limit);
        self
    }

    pub fn range(&self) -> SolRange {
        SolRange::new(self.start, self.end)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_url.trim().is_empty() {
            return Err(ConfigError::Missing("manifest_url"));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.max_concurrent_fetches == Some(0) {
            return Err(ConfigError::invalid(
                "max_concurrent_fetches",
                "must be greater than 0",
            ));
        }

        if self.max_concurrent_writes == Some(0) {
            return Err(ConfigError::invalid(
                "max_concurrent_writes",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `host:port`
    pub connection: String,
    pub user: String,
    /// May be empty
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection: DEFAULT_DB_CONNECTION.to_string(),
            user: String::new(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            max_connections: default_max_connections(),
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Two connections per available CPU.
pub fn default_max_connections() -> u32 {
    std::thread::available_parallelism()
        .map(|n| u32::try_from(n.get()).unwrap_or(u32::MAX / 2).saturating_mul(2))
        .unwrap_or(8)
}

impl DatabaseConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Split `connection` into host and port.
    pub fn host_port(&self) -> Result<(String, u16), ConfigError> {
        let connection = self.connection.trim();
        if connection.is_empty() {
            return Err(ConfigError::Missing("connection"));
        }

        match connection.rsplit_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(ConfigError::invalid("connection", "host is empty"));
                }
                let port = port.parse::<u16>().map_err(|e| {
                    ConfigError::invalid("connection", format!("bad port '{}': {}", port, e))
                })?;
                Ok((host.to_string(), port))
            },
            None => Ok((connection.to_string(), DEFAULT_DB_PORT)),
        }
    }

    /// Check every required setting. Runs before any network access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.host_port()?;

        if self.user.trim().is_empty() {
            return Err(ConfigError::Missing("user"));
        }

        if self.database.trim().is_empty() {
            return Err(ConfigError::Missing("database"));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::invalid(
                "max_connections",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        self.validate()?;
        let (host, port) = self.host_port()?;

        Ok(PgConnectOptions::new()
            .host(&host)
            .port(port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database))
    }
}

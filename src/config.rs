use crate::error::{AppError, AppResult};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const POOL_MIN_CONNECTIONS: u32 = 1;
pub const POOL_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PORT: u16 = 5432;

/// Where the analytics tables live and how many connections may be checked out.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_ms", &self.acquire_timeout_ms)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            database: database.into(),
            min_connections: POOL_MIN_CONNECTIONS,
            max_connections: POOL_MAX_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
        .clamped()
    }

    /// Load settings from `ADSIGHT_*` environment variables, reading `.env` first if present.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| AppError::ConfigError(format!("{} is not set", key)))
        };
        let parsed = |key: &str, default: u64| -> AppResult<u64> {
            match lookup(key) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                    AppError::ConfigError(format!("{} must be a non-negative integer: {}", key, e))
                }),
                None => Ok(default),
            }
        };

        let port = parsed("ADSIGHT_DB_PORT", DEFAULT_PORT as u64)?;
        let port = u16::try_from(port)
            .map_err(|_| AppError::ConfigError(format!("ADSIGHT_DB_PORT out of range: {}", port)))?;

        let connections = |key: &str, default: u32| -> AppResult<u32> {
            let value = parsed(key, default as u64)?;
            u32::try_from(value)
                .map_err(|_| AppError::ConfigError(format!("{} out of range: {}", key, value)))
        };

        let config = Self {
            host: required("ADSIGHT_DB_HOST")?,
            port,
            username: required("ADSIGHT_DB_USER")?,
            password: lookup("ADSIGHT_DB_PASSWORD").unwrap_or_default(),
            database: required("ADSIGHT_DB_NAME")?,
            min_connections: connections("ADSIGHT_POOL_MIN", POOL_MIN_CONNECTIONS)?,
            max_connections: connections("ADSIGHT_POOL_MAX", POOL_MAX_CONNECTIONS)?,
            acquire_timeout_ms: parsed("ADSIGHT_POOL_ACQUIRE_TIMEOUT_MS", DEFAULT_ACQUIRE_TIMEOUT_MS)?,
        };

        Ok(config.clamped())
    }

    /// Keep pool bounds inside `[1, 20]` with `min <= max`.
    pub fn clamped(mut self) -> Self {
        self.max_connections = self
            .max_connections
            .clamp(POOL_MIN_CONNECTIONS, POOL_MAX_CONNECTIONS);
        self.min_connections = self
            .min_connections
            .clamp(POOL_MIN_CONNECTIONS, self.max_connections);
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Build a properly encoded connection URL.
    /// Handles special characters in username, password, and database name.
    pub fn connection_url(&self) -> String {
        let username = utf8_percent_encode(&self.username, NON_ALPHANUMERIC).to_string();
        let password = utf8_percent_encode(&self.password, NON_ALPHANUMERIC).to_string();
        let database = utf8_percent_encode(&self.database, NON_ALPHANUMERIC).to_string();

        format!(
            "postgresql://{}:{}@{}:{}/{}",
            username, password, self.host, self.port, database
        )
    }
}

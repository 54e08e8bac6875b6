use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use anyhow::{Context, Result};

use crate::db::PoolSettings;

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The address the HTTP listener binds to.
    pub listen: SocketAddr,
    /// The public URL prefix of returned paste links, always ending in `/`.
    pub url: String,
    /// The static front page.
    pub front_page: PathBuf,
    /// The ephemeral cache capacity.
    pub max_entries: usize,
    /// The largest ephemeral payload in bytes.
    pub max_entry_size: usize,
    /// The URL of the PostgreSQL database. Its presence enables durable mode.
    pub database_url: Option<String>,
    /// The directory holding durable ciphertext files.
    pub data_path: PathBuf,
    /// The reserved credential that is valid without a session.
    pub persist_user: Option<String>,
    /// The idle session timeout in seconds.
    pub session_timeout_secs: i64,
    /// How often idle sessions are swept.
    pub session_sweep_interval: Duration,
    /// How often expired durable pastes are swept.
    pub expiry_sweep_interval: Duration,
    /// The durable store capacity.
    pub database_max_entries: i64,
    /// The largest durable payload in bytes.
    pub database_max_entry_size: usize,
    /// Connection pool sizing.
    pub database_pool: PoolSettings,
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}

fn positive<T>(value: T, key: &str) -> Result<T>
where
    T: PartialOrd + Default,
{
    if value <= T::default() {
        anyhow::bail!("{} must be positive", key);
    }
    Ok(value)
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut url = var("PASTAE_URL").unwrap_or_else(|| "http://127.0.0.1:3000/".to_string());
        if !url.ends_with('/') {
            url.push('/');
        }

        Ok(Self {
            listen: parse_or(var("PASTAE_LISTEN"), "PASTAE_LISTEN", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            url,
            front_page: var("PASTAE_FRONT_PAGE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/index.html")),
            max_entries: positive(
                parse_or(var("PASTAE_MAX_ENTRIES"), "PASTAE_MAX_ENTRIES", 1000)?,
                "PASTAE_MAX_ENTRIES",
            )?,
            max_entry_size: positive(
                parse_or(var("PASTAE_MAX_ENTRY_SIZE"), "PASTAE_MAX_ENTRY_SIZE", 10 * 1024 * 1024)?,
                "PASTAE_MAX_ENTRY_SIZE",
            )?,
            database_url: var("DATABASE_URL"),
            data_path: var("PASTAE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            persist_user: var("PASTAE_PERSIST_USER"),
            session_timeout_secs: positive(
                parse_or(var("PASTAE_SESSION_TIMEOUT"), "PASTAE_SESSION_TIMEOUT", 3600)?,
                "PASTAE_SESSION_TIMEOUT",
            )?,
            session_sweep_interval: Duration::from_secs(positive(
                parse_or(var("PASTAE_SESSION_SWEEP_INTERVAL"), "PASTAE_SESSION_SWEEP_INTERVAL", 60)?,
                "PASTAE_SESSION_SWEEP_INTERVAL",
            )?),
            expiry_sweep_interval: Duration::from_secs(positive(
                parse_or(var("PASTAE_EXPIRY_SWEEP_INTERVAL"), "PASTAE_EXPIRY_SWEEP_INTERVAL", 60)?,
                "PASTAE_EXPIRY_SWEEP_INTERVAL",
            )?),
            database_max_entries: positive(
                parse_or(var("PASTAE_DATABASE_MAX_ENTRIES"), "PASTAE_DATABASE_MAX_ENTRIES", 100_000)?,
                "PASTAE_DATABASE_MAX_ENTRIES",
            )?,
            database_max_entry_size: positive(
                parse_or(
                    var("PASTAE_DATABASE_MAX_ENTRY_SIZE"),
                    "PASTAE_DATABASE_MAX_ENTRY_SIZE",
                    50 * 1024 * 1024,
                )?,
                "PASTAE_DATABASE_MAX_ENTRY_SIZE",
            )?,
            database_pool: PoolSettings {
                max_size: positive(
                    parse_or(
                        var("PASTAE_DATABASE_POOL_SIZE"),
                        "PASTAE_DATABASE_POOL_SIZE",
                        PoolSettings::default().max_size,
                    )?,
                    "PASTAE_DATABASE_POOL_SIZE",
                )?,
                wait_timeout: Duration::from_secs(positive(
                    parse_or(
                        var("PASTAE_DATABASE_WAIT_TIMEOUT"),
                        "PASTAE_DATABASE_WAIT_TIMEOUT",
                        PoolSettings::default().wait_timeout.as_secs(),
                    )?,
                    "PASTAE_DATABASE_WAIT_TIMEOUT",
                )?),
            },
        })
    }

    /// Whether pastes are stored in the database.
    pub fn is_durable(&self) -> bool {
        self.database_url.is_some()
    }

    /// The largest request body the upload route accepts.
    pub fn body_limit(&self) -> usize {
        let largest = if self.is_durable() {
            self.max_entry_size.max(self.database_max_entry_size)
        } else {
            self.max_entry_size
        };
        // Room for multipart boundaries and the small text fields.
        largest + 64 * 1024
    }
}

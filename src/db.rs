use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use tokio_postgres::{NoTls, config::Host};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Sizing and timeouts of the connection pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSettings {
    /// The most connections kept open at once.
    pub max_size: usize,
    /// How long a request waits for a free connection.
    pub wait_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 32,
            wait_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates a new database connection pool.
///
/// No connection is opened until the pool is first used, so a bad host
/// only surfaces on the first query.
///
/// # Arguments
///
/// * `database_url` - A `postgres://` URL. Only TCP hosts are used.
/// * `settings` - Pool size and wait timeout.
pub fn create_pool(database_url: &str, settings: PoolSettings) -> Result<Pool> {
    let parsed: tokio_postgres::Config = database_url.parse()?;

    let host = parsed.get_hosts().iter().find_map(|host| match host {
        Host::Tcp(name) => Some(name.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    });

    let mut cfg = Config::new();
    cfg.host = host;
    cfg.port = parsed.get_ports().first().copied();
    cfg.dbname = parsed.get_dbname().map(str::to_string);
    cfg.user = parsed.get_user().map(str::to_string);
    cfg.password = parsed
        .get_password()
        .map(|password| String::from_utf8_lossy(password).into_owned());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig {
        max_size: settings.max_size,
        timeouts: Timeouts {
            wait: Some(settings.wait_timeout),
            create: Some(Duration::from_secs(2)),
            recycle: Some(Duration::from_secs(1)),
        },
        ..Default::default()
    });

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| AppError::Internal(format!("Failed to create pool: {}", e)))
}

/// Creates the `users` and `data` tables and their indexes if missing.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                hash TEXT NOT NULL UNIQUE,
                kek BYTEA NOT NULL
            );
            CREATE TABLE IF NOT EXISTS data (
                id BIGSERIAL PRIMARY KEY,
                uid BIGINT NOT NULL,
                pid TEXT NOT NULL,
                fname TEXT NOT NULL,
                key BYTEA NOT NULL,
                nonce BYTEA NOT NULL,
                ct TEXT NOT NULL,
                expire BIGINT
            );
            CREATE INDEX IF NOT EXISTS data_uid ON data (uid);
            CREATE UNIQUE INDEX IF NOT EXISTS data_pid ON data (pid);
            CREATE INDEX IF NOT EXISTS data_expire ON data (expire);
            "#,
        )
        .await?;

    tracing::info!("Database schema ready");
    Ok(())
}

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    backend::PasteBackend,
    cache::EphemeralCache,
    durable::DurableStore,
    sessions::SessionManager,
};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The paste store selected at startup.
    pub backend: PasteBackend,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// With `DATABASE_URL` set this opens the pool, prepares the schema,
    /// registers the persist identity and seeds the durable counter.
    /// Otherwise the service runs memory-only.
    pub async fn new(config: &Config) -> Result<Self> {
        let cache = EphemeralCache::new(config.max_entries, config.max_entry_size)?;
        tracing::info!("Ephemeral cache initialized (capacity {})", config.max_entries);

        let backend = match config.database_url.as_deref() {
            None => PasteBackend::Ephemeral(cache),
            Some(database_url) => {
                let db = crate::db::create_pool(database_url, config.database_pool)?;
                crate::db::init_schema(&db).await?;
                tracing::info!("PostgreSQL pool initialized");

                let sessions = SessionManager::new(
                    db.clone(),
                    config.persist_user.clone(),
                    config.session_timeout_secs,
                );
                sessions.ensure_persist_user().await?;

                let store = DurableStore::open(
                    db,
                    config.data_path.clone(),
                    config.database_max_entries,
                    config.database_max_entry_size,
                )
                .await?;

                PasteBackend::Durable { cache, store, sessions }
            }
        };

        Ok(AppState {
            config: config.clone(),
            backend,
        })
    }

    /// Builds a memory-only state without touching the network.
    pub fn ephemeral(config: &Config) -> Result<Self> {
        Ok(AppState {
            config: config.clone(),
            backend: PasteBackend::Ephemeral(EphemeralCache::new(
                config.max_entries,
                config.max_entry_size,
            )?),
        })
    }
}

use zeroize::Zeroizing;

use crate::{
    error::{AppError, Result},
    models::{
        paste::{Paste, PasteListing},
        session::AuthUser,
    },
    services::{cache::EphemeralCache, durable::DurableStore, sessions::SessionManager},
};

/// A paste submitted for storage.
pub struct NewPaste {
    /// The payload.
    pub data: Zeroizing<Vec<u8>>,
    /// The content-type label derived by the HTTP layer.
    pub content_type: String,
    /// Whether the paste is destroyed by its first read.
    pub burn_after_reading: bool,
    /// Expiry in epoch seconds. Durable entries only.
    pub expire_at: Option<i64>,
}

/// The paste store the process runs with, chosen once at startup.
#[derive(Clone)]
pub enum PasteBackend {
    /// Memory only; no users, no sessions.
    Ephemeral(EphemeralCache),
    /// Database and disk, with sessions. Burn-after-reading pastes still go
    /// to the cache.
    Durable {
        /// Holds the burn-after-reading pastes.
        cache: EphemeralCache,
        /// Holds everything else.
        store: DurableStore,
        /// Authenticates uploads and owner-scoped operations.
        sessions: SessionManager,
    },
}

impl PasteBackend {
    /// The session manager, present in durable mode.
    pub fn sessions(&self) -> Option<&SessionManager> {
        match self {
            PasteBackend::Ephemeral(_) => None,
            PasteBackend::Durable { sessions, .. } => Some(sessions),
        }
    }

    /// The durable store, present in durable mode.
    pub fn durable(&self) -> Option<&DurableStore> {
        match self {
            PasteBackend::Ephemeral(_) => None,
            PasteBackend::Durable { store, .. } => Some(store),
        }
    }

    /// Stores a paste.
    ///
    /// In durable mode `owner` is required.
    pub async fn insert(&self, paste: NewPaste, owner: Option<&AuthUser>) -> Result<String> {
        match self {
            PasteBackend::Ephemeral(cache) => {
                cache
                    .insert(&paste.data, paste.burn_after_reading, &paste.content_type)
                    .await
            }
            PasteBackend::Durable { cache, store, .. } => {
                let owner = owner.ok_or(AppError::Unauthorized)?;
                if paste.burn_after_reading {
                    return cache.insert(&paste.data, true, &paste.content_type).await;
                }
                store
                    .insert(
                        paste.data,
                        &paste.content_type,
                        owner.user_id,
                        paste.expire_at,
                        owner.wrapping_key.clone(),
                    )
                    .await
            }
        }
    }

    /// Fetches a paste by public id.
    pub async fn fetch(&self, id: &str) -> Result<Paste> {
        match self {
            PasteBackend::Ephemeral(cache) => cache.fetch(id).await,
            PasteBackend::Durable { cache, store, .. } => match cache.fetch(id).await {
                Err(AppError::NotFound) => store.fetch(id).await,
                other => other,
            },
        }
    }

    /// Deletes a durable paste owned by `owner`.
    pub async fn delete(&self, id: &str, owner: &AuthUser) -> Result<()> {
        match self {
            PasteBackend::Ephemeral(_) => Err(AppError::Unauthorized),
            PasteBackend::Durable { store, .. } => store.delete_owned(id, owner.user_id).await,
        }
    }

    /// Sets the expiry of a durable paste owned by `owner`.
    pub async fn set_expiry(&self, id: &str, owner: &AuthUser, days: i64) -> Result<()> {
        match self {
            PasteBackend::Ephemeral(_) => Err(AppError::Unauthorized),
            PasteBackend::Durable { store, .. } => store.set_expiry(id, owner.user_id, days).await,
        }
    }

    /// Lists the durable pastes of `owner`.
    pub async fn list(&self, owner: &AuthUser) -> Result<Vec<PasteListing>> {
        match self {
            PasteBackend::Ephemeral(_) => Err(AppError::Unauthorized),
            PasteBackend::Durable { store, .. } => store.list_for_user(owner.user_id).await,
        }
    }
}

use deadpool_postgres::Pool;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use crate::{
    crypto::{envelope, token},
    error::{AppError, Result},
    models::session::{AuthUser, Session},
    repositories::user as user_repo,
    validation::paste::validate_credential,
};

/// The in-memory session table, keyed by token.
#[derive(Clone, Default)]
pub struct SessionTable {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session under `token`.
    pub async fn insert(&self, token: String, session: Session) {
        self.sessions.write().await.insert(token, session);
    }

    /// Looks up a session.
    pub async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Slides a session's activity timestamp to `now`.
    ///
    /// # Returns
    ///
    /// `false` if the session does not exist.
    pub async fn touch(&self, token: &str, now: i64) -> bool {
        match self.sessions.write().await.get_mut(token) {
            Some(session) => {
                session.last_active = now;
                true
            }
            None => false,
        }
    }

    /// Removes a session, returning whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Removes every session idle for longer than `timeout_secs`.
    ///
    /// Scan and removal happen under one write lock, so a ping that lands
    /// before the sweep is seen and a ping after it finds the session gone.
    pub async fn sweep_idle(&self, now: i64, timeout_secs: i64) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| now - session.last_active <= timeout_secs);
        before - sessions.len()
    }

    /// Returns the number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns whether there are no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Authenticates requests against the session table and the user table.
#[derive(Clone)]
pub struct SessionManager {
    db: Pool,
    table: SessionTable,
    persist_user: Option<Arc<str>>,
    timeout_secs: i64,
}

impl SessionManager {
    /// Creates a new `SessionManager`.
    ///
    /// # Arguments
    ///
    /// * `db` - The database connection pool.
    /// * `persist_user` - The reserved credential that is valid without a session.
    /// * `timeout_secs` - The idle timeout in seconds.
    pub fn new(db: Pool, persist_user: Option<String>, timeout_secs: i64) -> Self {
        Self {
            db,
            table: SessionTable::new(),
            persist_user: persist_user.filter(|p| !p.is_empty()).map(Arc::from),
            timeout_secs,
        }
    }

    /// The underlying session table.
    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    fn is_persist_user(&self, credential: &str) -> bool {
        self.persist_user
            .as_deref()
            .is_some_and(|persist| bool::from(persist.as_bytes().ct_eq(credential.as_bytes())))
    }

    /// Registers a user with a freshly generated wrapping key.
    pub async fn register(&self, credential: &str) -> Result<i64> {
        validate_credential(credential)?;
        let kek = envelope::generate_wrapping_key()?;
        let user = user_repo::create_user(&self.db, credential, &kek).await?;
        tracing::info!("User registered: {}", user.id);
        Ok(user.id)
    }

    /// Makes sure the persist identity has a user row.
    pub async fn ensure_persist_user(&self) -> Result<()> {
        let Some(persist) = self.persist_user.as_deref() else {
            return Ok(());
        };

        if user_repo::find_by_hash(&self.db, persist).await?.is_none() {
            let kek = envelope::generate_wrapping_key()?;
            let user = user_repo::create_user(&self.db, persist, &kek).await?;
            tracing::info!("Persist user created: {}", user.id);
        }
        Ok(())
    }

    /// Opens a session for the user behind `credential`.
    ///
    /// # Returns
    ///
    /// The session token. The persist identity can never log in.
    pub async fn login(&self, credential: &str) -> Result<String> {
        if credential.is_empty() || self.is_persist_user(credential) {
            return Err(AppError::Unauthorized);
        }

        let user = user_repo::find_by_hash(&self.db, credential)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let token = token::generate_session_token()?;
        self.table
            .insert(
                token.clone(),
                Session {
                    user_id: user.id,
                    wrapping_key: user.kek.clone(),
                    last_active: chrono::Utc::now().timestamp(),
                },
            )
            .await;

        tracing::info!("User logged in: {}", user.id);
        Ok(token)
    }

    /// Resolves a token to its user.
    ///
    /// An empty token resolves to the persist identity straight from the
    /// user table when one is configured.
    pub async fn validate(&self, token: &str) -> Result<AuthUser> {
        if token.is_empty() {
            let persist = self.persist_user.as_deref().ok_or(AppError::Unauthorized)?;
            let user = user_repo::find_by_hash(&self.db, persist)
                .await?
                .ok_or(AppError::Unauthorized)?;
            return Ok(AuthUser {
                user_id: user.id,
                wrapping_key: user.kek,
            });
        }

        let session = self.table.get(token).await.ok_or(AppError::Unauthorized)?;
        Ok(AuthUser {
            user_id: session.user_id,
            wrapping_key: session.wrapping_key,
        })
    }

    /// Extends a session's idle window. No-op for unknown tokens.
    pub async fn ping(&self, token: &str) -> bool {
        self.table.touch(token, chrono::Utc::now().timestamp()).await
    }

    /// Ends a session. Idempotent.
    pub async fn logout(&self, token: &str) {
        if self.table.remove(token).await {
            tracing::info!("Session closed");
        }
    }

    /// Removes every session idle for longer than the configured timeout.
    pub async fn sweep_idle(&self) -> usize {
        self.table
            .sweep_idle(chrono::Utc::now().timestamp(), self.timeout_secs)
            .await
    }
}

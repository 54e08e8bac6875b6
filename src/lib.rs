//! A self-hosted paste service with envelope-encrypted storage.
//!
//! Pastes live either in a bounded in-memory cache sealed under a
//! process-lifetime key, or, when a database is configured, as a metadata
//! row plus an encrypted file sealed under the owner's key.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod aes;
    pub mod envelope;
    pub mod token;
}

pub mod models {
    pub mod paste;
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod paste;
    pub mod user;
}

pub mod services {
    pub mod backend;
    pub mod cache;
    pub mod durable;
    pub mod sessions;
    pub mod sweepers;
}

pub mod handlers {
    pub mod paste;
    pub mod session;
}

pub mod middleware_layer {
    pub mod auth;
}

pub mod validation {
    pub mod paste;
}

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::build_router;
pub use state::AppState;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed key or nonce, AEAD failure, or entropy exhaustion.
    /// Always terminal for the operation that raised it.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Unknown public id or empty filename.
    #[error("Resource not found")]
    NotFound,

    /// Missing, expired or foreign session, or reserved identity misuse.
    #[error("Authorization failed")]
    Unauthorized,

    /// A capacity eviction found nothing left to evict.
    #[error("Capacity eviction lost a race")]
    CapacityRace,

    /// One half of a durable write failed and its counterpart could not be undone.
    #[error("Storage inconsistency: {0}")]
    StorageInconsistency(String),

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The payload exceeds the configured entry size.
    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// A multipart error.
    #[error("Multipart error: {0}")]
    Multipart(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            // The body limit cut the stream short; the true size is unknown.
            return AppError::PayloadTooLarge(0);
        }
        AppError::Multipart(e.body_text())
    }
}

impl AppError {
    /// The status code the HTTP layer answers with.
    ///
    /// Crypto and storage failures collapse into `404` so a client cannot
    /// tell a tampered or unreadable entry apart from a missing one.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound
            | AppError::Crypto(_)
            | AppError::CapacityRace
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Io(_)
            | AppError::StorageInconsistency(_)
            | AppError::Internal(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                "Not found".to_string()
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                "Not found".to_string()
            }

            AppError::Io(ref e) => {
                tracing::error!("IO error: {}", e);
                "Not found".to_string()
            }

            AppError::Crypto(ref msg) => {
                tracing::warn!("Crypto error: {}", msg);
                "Not found".to_string()
            }

            AppError::StorageInconsistency(ref msg) => {
                tracing::error!("Storage inconsistency: {}", msg);
                "Not found".to_string()
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Not found".to_string()
            }

            AppError::CapacityRace | AppError::NotFound => {
                tracing::debug!("Resource not found");
                "Not found".to_string()
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                "Unauthorized".to_string()
            }

            AppError::Validation(ref msg) | AppError::Multipart(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                msg.clone()
            }

            AppError::PayloadTooLarge(size) => {
                tracing::debug!("Payload too large: {} bytes", size);
                "Payload too large".to_string()
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Not found"}"#.to_string());

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_and_crypto_failures_look_like_missing_entries() {
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Crypto("tag".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::StorageInconsistency("orphan file".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Io(std::io::Error::other("disk")).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn client_errors_keep_their_status() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::PayloadTooLarge(10).status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn response_body_hides_crypto_details() {
        let response = AppError::Crypto("aead::Error".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

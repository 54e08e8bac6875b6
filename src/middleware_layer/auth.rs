use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::AppError, state::AppState};

/// The header carrying the session token.
pub const SESSION_HEADER: &str = "pastae-sessid";

/// Extracts the session token from the request headers.
///
/// A missing or non-UTF-8 header yields the empty token, which only the
/// persist identity can use.
pub fn session_token(headers: &HeaderMap) -> &str {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// A middleware that requires a valid session (or the persist identity).
///
/// On success the resolved `AuthUser` is stored in the request extensions.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(sessions) = state.backend.sessions() else {
        return AppError::Unauthorized.into_response();
    };

    let token = session_token(request.headers()).to_string();
    match sessions.validate(&token).await {
        Ok(user) => {
            tracing::debug!("Request authenticated as user {}", user.user_id);
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Session rejected: {}", e);
            e.into_response()
        }
    }
}

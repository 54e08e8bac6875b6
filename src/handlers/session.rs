use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::session_token,
    services::sessions::SessionManager,
    state::AppState,
};

fn sessions(state: &AppState) -> Result<&SessionManager> {
    state.backend.sessions().ok_or(AppError::Unauthorized)
}

/// Handles user registration. The body is the credential hash.
pub async fn register(State(state): State<AppState>, credential: String) -> Result<Response> {
    let user_id = sessions(&state)?.register(credential.trim()).await?;
    tracing::debug!("Registered user {}", user_id);
    Ok((StatusCode::OK, "OK").into_response())
}

/// Handles login. Responds with the session token.
pub async fn login(State(state): State<AppState>, credential: String) -> Result<Response> {
    let token = sessions(&state)?.login(credential.trim()).await?;
    Ok((StatusCode::OK, token).into_response())
}

/// Handles logout. Succeeds whether or not the session still exists.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    sessions(&state)?.logout(session_token(&headers)).await;
    Ok(StatusCode::OK.into_response())
}

/// Handles a keep-alive ping, sliding the session's idle window.
pub async fn ping(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if !sessions(&state)?.ping(session_token(&headers)).await {
        return Err(AppError::Unauthorized);
    }
    Ok(StatusCode::OK.into_response())
}

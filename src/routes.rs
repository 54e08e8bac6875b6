use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::{
    services::ServeFile,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

/// Builds the HTTP router for the selected paste backend.
///
/// Session routes, listing, expiry and deletion exist only in durable
/// mode, where uploads also require a session.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route_service("/", ServeFile::new(&state.config.front_page))
        .route("/{id}", get(handlers::paste::fetch));

    let app = if state.backend.sessions().is_some() {
        let session_routes = Router::new()
            .route("/session/register", post(handlers::session::register))
            .route("/session/login", post(handlers::session::login))
            .route("/session/logout", post(handlers::session::logout))
            .route("/session/ping", post(handlers::session::ping));

        let protected_routes = Router::new()
            .route("/upload", post(handlers::paste::upload))
            .route("/session/list", post(handlers::paste::list))
            .route("/expiry/{id}/{days}", post(handlers::paste::set_expiry))
            .route("/{id}", delete(handlers::paste::delete))
            .route_layer(from_fn_with_state(
                state.clone(),
                middleware_layer::auth::require_session,
            ));

        public_routes.merge(session_routes).merge(protected_routes)
    } else {
        public_routes.route("/upload", post(handlers::paste::upload))
    };

    app.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::default())
            .on_request(DefaultOnRequest::default().level(Level::DEBUG))
            .on_response(DefaultOnResponse::default().level(Level::DEBUG))
            .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
    )
    .layer(DefaultBodyLimit::max(state.config.body_limit()))
    .with_state(state)
}

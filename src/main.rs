use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pastae::{
    config::Config,
    services::{backend::PasteBackend, sweepers},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(&config).await?;

    let shutdown = CancellationToken::new();
    let mut background = Vec::new();
    match &state.backend {
        PasteBackend::Durable { store, sessions, .. } => {
            background.push(sweepers::spawn_session_sweeper(
                sessions.clone(),
                config.session_sweep_interval,
                shutdown.child_token(),
            ));
            background.push(sweepers::spawn_expiry_sweeper(
                store.clone(),
                config.expiry_sweep_interval,
                shutdown.child_token(),
            ));
            tracing::info!("Durable mode: sessions and expiry sweepers started");
        }
        PasteBackend::Ephemeral(_) => {
            tracing::info!("Ephemeral mode: pastes are kept in memory only");
        }
    }

    let app = pastae::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("Server listening on http://{}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    for handle in background {
        if let Err(e) = handle.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}

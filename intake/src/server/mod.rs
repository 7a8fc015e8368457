//! HTTP server assembly

use crate::config::IntakeConfig;
use crate::handlers;
use crate::state::IntakeState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Builds the application router
///
/// The upload route gets its own body limit so that files up to
/// `upload.max_file_size` (plus multipart overhead) reach the validator.
pub fn router(state: IntakeState) -> Router {
    let body_limit = state.config().upload.body_limit();

    Router::new()
        .route(
            "/api/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/upload/token", post(handlers::issue_token))
        .route("/api/upload/complete", post(handlers::complete_upload))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Serves the configured application until Ctrl-C
///
/// # Errors
///
/// Returns an error if the storage backend cannot be set up, the address
/// cannot be bound, or the server fails.
pub async fn run(config: IntakeConfig) -> anyhow::Result<()> {
    let bind = config.server.bind;
    let backend = config.storage.backend;
    let app = router(IntakeState::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(address = %listener.local_addr()?, %backend, "intake listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("intake stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining connections");
}

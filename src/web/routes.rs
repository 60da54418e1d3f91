//! Route definitions

use super::handlers;
use super::state::AppState;
use crate::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Protocol endpoint
        .route("/mcp", post(handlers::mcp))
        // Introspection
        .route("/health", get(handlers::health))
        .route("/tools", get(handlers::tools))
        .route("/stats", get(handlers::stats))
        .layer(cors)
        .with_state(state)
}

/// Serve the router until ctrl-c
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting server on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

//! HTTP request handlers

use super::state::AppState;
use crate::mcp::{protocol::INTERNAL_ERROR, JsonRpcResponse};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Handle one JSON-RPC message
///
/// Notifications are acknowledged with `202 Accepted` and no body.
pub async fn mcp(State(state): State<AppState>, body: String) -> Response {
    match state.server.handle_message(&body).await {
        Ok(Some(reply)) => ([(header::CONTENT_TYPE, "application/json")], reply).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            tracing::error!("Failed to handle message: {}", e);
            let response =
                JsonRpcResponse::error(None, INTERNAL_ERROR, format!("Internal error: {}", e));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.server.dispatcher().engine();
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "engine": engine.name(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Published tool definitions
pub async fn tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.server.dispatcher().definitions())
}

/// Engine capabilities and call statistics
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.server.dispatcher();
    Json(json!({
        "server": state.server.info().name,
        "engine": dispatcher.engine().descriptor(),
        "tools": dispatcher.tool_names(),
        "in_flight": state.server.in_flight_calls(),
        "metrics": dispatcher.metrics().snapshot(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

//! JSON-RPC request handlers.

use crate::server::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use farcall::ipc::{respond, RpcRequest, RpcResponse};
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint.
pub async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "endpoints": state.endpoints.endpoints(),
    }))
}

/// Main JSON-RPC handler.
///
/// Every method name is a dispatcher operation; `params` carries the
/// endpoint, positional arguments and their signature. Validation and error
/// mapping are shared with the framed TCP server.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RpcRequest>,
) -> Json<RpcResponse> {
    Json(respond(state.endpoints.as_ref(), request).await)
}

//! Webhook HTTP surface.
//!
//! One route per provider plus a health probe. Handlers stay thin: signature
//! checking, parsing, and application all live in the shared pipeline.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};

use crate::db::AppState;
use crate::providers::{self, WebhookAck};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks/workos", post(handle_workos_webhook))
        .route("/webhooks/clerk", post(handle_clerk_webhook))
        .route("/webhooks/health", get(health_check))
}

async fn handle_workos_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    providers::handle_webhook(&providers::WorkosProvider, &state, headers, body).await
}

async fn handle_clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    providers::handle_webhook(&providers::ClerkProvider, &state, headers, body).await
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

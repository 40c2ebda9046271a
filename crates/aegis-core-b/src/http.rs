//! Core-B's handshake/health/metrics HTTP surface. Kept deliberately tiny —
//! three read-only endpoints, no state mutation on `GET /public-key` (it is
//! idempotent by design, see workspace spec §4.3).

use crate::state::SharedState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/public-key", get(public_key))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn public_key(State(state): State<SharedState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        state.crypto.public_key_pem().to_string(),
    )
        .into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

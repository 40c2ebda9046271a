//! The catch-all client-facing proxy handler — workspace spec §4.2's
//! per-request pipeline, steps 1 through 8.

use crate::error::CoreAError;
use crate::handshake::perform_handshake;
use crate::state::SharedState;
use aegis_crypto::{canonical_associated_data, CryptoEngine};
use aegis_proto::inner::{InnerRequest, InnerResponse};
use aegis_proto::AegisRequest;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use std::collections::BTreeMap;
use tonic::Code;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

/// Builds Core-A's client-facing router: a liveness probe plus a catch-all
/// fallback that proxies every other method/path through `proxy`. Every
/// request/response is logged via `tower_http`'s `TraceLayer`, the same
/// crate the teacher reaches for around its own `axum` routers.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Workspace spec §6: `GET /health` always answers 200, reporting whether a
/// session key is currently held — never the cause of a proxy failure itself.
async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let session_ready = state.session_key.read().await.is_some();
    Json(json!({ "status": "ok", "session_ready": session_ready }))
}

pub async fn proxy(State(state): State<SharedState>, request: Request<Body>) -> Response {
    match proxy_inner(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn proxy_inner(state: SharedState, request: Request<Body>) -> Result<Response, CoreAError> {
    let (parts, body) = request.into_parts();

    // 1. Size gate on Content-Length, if present.
    if let Some(value) = parts.headers.get(axum::http::header::CONTENT_LENGTH) {
        match value.to_str().ok().and_then(|s| s.parse::<usize>().ok()) {
            Some(len) if len > state.config.max_request_size => {
                return Err(CoreAError::PayloadTooLarge);
            }
            Some(_) => {}
            None => return Err(CoreAError::InvalidContentLength),
        }
    }

    // 2. Streamed body accumulation, capped at max_request_size.
    let body_bytes = to_bytes(body, state.config.max_request_size + 1)
        .await
        .map_err(|_| CoreAError::PayloadTooLarge)?;
    if body_bytes.len() > state.config.max_request_size {
        return Err(CoreAError::PayloadTooLarge);
    }

    // 3. Session-key check, with one lazy re-handshake attempt.
    if state.session_key.read().await.is_none() && !perform_handshake(&state).await {
        return Err(CoreAError::NotReady);
    }

    // 4. Assemble the inner plaintext and its associated data.
    let path_with_query = match parts.uri.query() {
        Some(q) => format!("{}?{}", parts.uri.path(), q),
        None => parts.uri.path().to_string(),
    };
    let headers = headers_excluding_host(&parts.headers);
    let inner_request = InnerRequest {
        method: parts.method.to_string(),
        path: path_with_query,
        headers,
        body: BASE64.encode(&body_bytes),
    };
    let payload_bytes =
        serde_json::to_vec(&inner_request).expect("InnerRequest serialization cannot fail");

    let trace_id = Uuid::new_v4().to_string();
    let mut cleartext_metadata = BTreeMap::new();
    cleartext_metadata.insert("trace_id".to_string(), trace_id);
    let associated_data = canonical_associated_data(&cleartext_metadata);

    // 5. Seal under the current session key.
    let session_key = state
        .session_key
        .read()
        .await
        .clone()
        .expect("session key was just established above");
    let envelope = CryptoEngine::seal(&session_key, &payload_bytes, &associated_data)
        .map_err(|_| CoreAError::NotReady)?;

    // 6–7. RPC call, with one retry on UNAUTHENTICATED after a full re-handshake.
    let aegis_response = call_with_expiry_retry(
        &state,
        envelope,
        cleartext_metadata.clone(),
        payload_bytes,
        associated_data,
    )
    .await?;

    // 8. Response decryption and relay.
    let response_metadata: BTreeMap<String, String> = aegis_response.metadata.into_iter().collect();
    if response_metadata.get("error").map(String::as_str) == Some("true") {
        return Err(CoreAError::OriginUnreachable);
    }
    let response_ad = canonical_associated_data(&response_metadata);

    let plaintext = CryptoEngine::open(&session_key, &aegis_response.encrypted_payload, &response_ad)
        .map_err(|_| CoreAError::BadResponseEnvelope)?;
    let inner_response: InnerResponse =
        serde_json::from_slice(&plaintext).map_err(|_| CoreAError::BadResponseEnvelope)?;

    build_client_response(inner_response)
}

/// Workspace spec §4.2 step 7: on `UNAUTHENTICATED`, re-handshake once and
/// retry the same plaintext sealed under the new key. Any other RPC error,
/// or a second failure after re-handshake, becomes a 503.
async fn call_with_expiry_retry(
    state: &SharedState,
    mut envelope: Vec<u8>,
    cleartext_metadata: BTreeMap<String, String>,
    payload_bytes: Vec<u8>,
    associated_data: Vec<u8>,
) -> Result<aegis_proto::AegisResponse, CoreAError> {
    let public_key = state.crypto.public_key_pem().as_bytes().to_vec();

    let first_attempt = send_process(state, envelope.clone(), public_key.clone(), cleartext_metadata.clone()).await;
    match first_attempt {
        Ok(response) => Ok(response),
        Err(status) if status.code() == Code::Unauthenticated => {
            warn!("session expired — renewing key and retrying once");
            if !perform_handshake(state).await {
                return Err(CoreAError::NotReady);
            }
            let new_key = state
                .session_key
                .read()
                .await
                .clone()
                .expect("perform_handshake succeeded, so a key is present");
            envelope = CryptoEngine::seal(&new_key, &payload_bytes, &associated_data)
                .map_err(|_| CoreAError::NotReady)?;
            send_process(state, envelope, public_key, cleartext_metadata)
                .await
                .map_err(|e| CoreAError::RpcUnavailable(e.message().to_string()))
        }
        Err(status) => Err(CoreAError::RpcUnavailable(status.message().to_string())),
    }
}

async fn send_process(
    state: &SharedState,
    envelope: Vec<u8>,
    public_key: Vec<u8>,
    cleartext_metadata: BTreeMap<String, String>,
) -> Result<aegis_proto::AegisResponse, tonic::Status> {
    let mut client = state.rpc_client.write().await.clone();
    let request = AegisRequest {
        encrypted_payload: envelope,
        public_key,
        metadata: cleartext_metadata.into_iter().collect(),
    };
    client.process(request).await.map(|r| r.into_inner())
}

fn headers_excluding_host(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| *name != axum::http::header::HOST)
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

fn build_client_response(inner: InnerResponse) -> Result<Response, CoreAError> {
    let body = BASE64
        .decode(&inner.body)
        .map_err(|_| CoreAError::BadResponseEnvelope)?;

    let mut response = Response::builder()
        .status(StatusCode::from_u16(inner.status_code).unwrap_or(StatusCode::OK));
    {
        let headers = response.headers_mut().expect("builder has no error yet");
        for (k, v) in &inner.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }
    }
    response
        .body(Body::from(body))
        .map_err(|_| CoreAError::BadResponseEnvelope)
}

//! The `AegisGateway` tonic service: session lookup, envelope open, origin
//! replay, envelope seal, deception. One `Process` call implements the
//! entire per-RPC pipeline in workspace spec §4.3.

use crate::error::CoreBError;
use crate::state::SharedState;
use aegis_crypto::{canonical_associated_data, AegisError, CryptoEngine, SessionKey};
use aegis_proto::aegis_gateway_server::AegisGateway;
use aegis_proto::health_check_response::ServingStatus;
use aegis_proto::inner::{InnerRequest, InnerResponse};
use aegis_proto::{AegisRequest, AegisResponse, HealthCheckRequest, HealthCheckResponse};
use aegis_session::SessionAccess;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::BTreeMap;
use std::time::Instant;
use tonic::{Request, Response, Status};
use tracing::warn;

/// Outer status codes the deception layer lies with, verbatim from
/// workspace spec §4.3.
const DECEPTIVE_STATUSES: [u32; 5] = [200, 404, 503, 403, 500];

pub struct AegisGatewayService {
    pub state: SharedState,
}

#[tonic::async_trait]
impl AegisGateway for AegisGatewayService {
    async fn health_check(
        &self,
        _request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, Status> {
        Ok(Response::new(HealthCheckResponse {
            status: ServingStatus::Serving as i32,
        }))
    }

    async fn process(
        &self,
        request: Request<AegisRequest>,
    ) -> Result<Response<AegisResponse>, Status> {
        let req = request.into_inner();

        let session_key = match self.lookup_or_derive_session(&req.public_key) {
            Ok(key) => key,
            Err(CoreBError::SessionExpired) => {
                self.state
                    .metrics
                    .requests_total
                    .with_label_values(&["session_expired"])
                    .inc();
                return Err(Status::unauthenticated(
                    "Session expired. Please re-handshake.",
                ));
            }
            Err(CoreBError::BadPeerKey(e)) => {
                self.state
                    .metrics
                    .requests_total
                    .with_label_values(&["bad_peer_key"])
                    .inc();
                return Err(Status::unauthenticated(e));
            }
            Err(other) => return Err(Status::internal(other.to_string())),
        };

        let metadata: BTreeMap<String, String> = req.metadata.into_iter().collect();
        let associated_data = canonical_associated_data(&metadata);

        let inner_request = match self.open_and_parse(&session_key, &req.encrypted_payload, &associated_data) {
            Some(inner) => inner,
            None => {
                self.state.metrics.crypto_errors.inc();
                self.state
                    .metrics
                    .requests_total
                    .with_label_values(&["crypto_error"])
                    .inc();
                return Ok(Response::new(AegisResponse {
                    fake_http_status: 400,
                    encrypted_payload: Vec::new(),
                    metadata: Default::default(),
                }));
            }
        };

        match self.replay_and_seal(&session_key, &inner_request).await {
            Ok((envelope, response_metadata, fake_status)) => {
                Ok(Response::new(AegisResponse {
                    fake_http_status: fake_status,
                    encrypted_payload: envelope,
                    metadata: response_metadata.into_iter().collect(),
                }))
            }
            Err(CoreBError::Origin(e)) => {
                warn!(error = %e, "origin request failed");
                self.state
                    .metrics
                    .requests_total
                    .with_label_values(&["upstream_error"])
                    .inc();
                let mut metadata = BTreeMap::new();
                metadata.insert("error".to_string(), "true".to_string());
                Ok(Response::new(AegisResponse {
                    fake_http_status: 500,
                    encrypted_payload: Vec::new(),
                    metadata: metadata.into_iter().collect(),
                }))
            }
            Err(other) => Err(Status::internal(other.to_string())),
        }
    }
}

impl AegisGatewayService {
    /// Workspace spec §4.3 step 1 — session lookup, with lazy TTL eviction.
    fn lookup_or_derive_session(&self, client_public_key: &[u8]) -> Result<SessionKey, CoreBError> {
        let now = Instant::now();
        match self.state.sessions.access(client_public_key, now) {
            SessionAccess::Fresh(key) => Ok(key),
            SessionAccess::Expired => {
                self.state.metrics.active_sessions.dec();
                Err(CoreBError::SessionExpired)
            }
            SessionAccess::Absent => {
                let pem = std::str::from_utf8(client_public_key)
                    .map_err(|e| CoreBError::BadPeerKey(e.to_string()))?;
                let key = self
                    .state
                    .crypto
                    .derive_shared_key(pem)
                    .map_err(|e: AegisError| {
                        warn!(error = %e, "failed to derive session key from peer public key");
                        CoreBError::BadPeerKey(e.to_string())
                    })?;
                self.state
                    .sessions
                    .insert(client_public_key.to_vec(), key.clone(), now);
                self.state.metrics.active_sessions.inc();
                Ok(key)
            }
        }
    }

    /// Workspace spec §4.3 step 2 — open the envelope and validate the
    /// inner JSON carries routing information. Returns `None` for any
    /// failure along the way (AEAD tag mismatch, malformed JSON, or a
    /// missing `method`/`path`) — all of which map to the same
    /// `fake_http_status = 400` response.
    fn open_and_parse(
        &self,
        session_key: &SessionKey,
        envelope: &[u8],
        associated_data: &[u8],
    ) -> Option<InnerRequest> {
        let plaintext = CryptoEngine::open(session_key, envelope, associated_data).ok()?;
        let inner: InnerRequest = serde_json::from_slice(&plaintext).ok()?;
        if inner.method.is_empty() || inner.path.is_empty() {
            return None;
        }
        Some(inner)
    }

    /// Workspace spec §4.3 steps 3–5 — replay against the origin, seal the
    /// response, and compute the deceptive outer status.
    async fn replay_and_seal(
        &self,
        session_key: &SessionKey,
        inner_request: &InnerRequest,
    ) -> Result<(Vec<u8>, BTreeMap<String, String>, u32), CoreBError> {
        let url = format!("{}{}", self.state.config.target_app_url, inner_request.path);
        let method = reqwest::Method::from_bytes(inner_request.method.as_bytes())
            .map_err(|_| CoreBError::CryptoOrPayload)?;

        let mut header_map = reqwest::header::HeaderMap::new();
        for (k, v) in &inner_request.headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(k.as_bytes()),
                reqwest::header::HeaderValue::from_str(v),
            ) {
                header_map.insert(name, value);
            }
        }

        let body_bytes = BASE64
            .decode(&inner_request.body)
            .map_err(|_| CoreBError::CryptoOrPayload)?;

        let response = self
            .state
            .origin_client
            .request(method, &url)
            .headers(header_map)
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| CoreBError::Origin(e.to_string()))?;

        let origin_status = response.status().as_u16();
        let response_headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| CoreBError::Origin(e.to_string()))?;

        let inner_response = InnerResponse {
            status_code: origin_status,
            headers: response_headers,
            body: BASE64.encode(&body),
        };
        let payload_bytes =
            serde_json::to_vec(&inner_response).expect("InnerResponse serialization cannot fail");

        let mut response_metadata = BTreeMap::new();
        response_metadata.insert("status".to_string(), origin_status.to_string());
        let response_ad = canonical_associated_data(&response_metadata);

        let envelope = CryptoEngine::seal(session_key, &payload_bytes, &response_ad)
            .map_err(|_| CoreBError::CryptoOrPayload)?;

        let fake_status = self.deceive(origin_status);
        Ok((envelope, response_metadata, fake_status))
    }

    fn deceive(&self, origin_status: u16) -> u32 {
        let is_honest = rand::random::<bool>();
        if is_honest {
            self.state
                .metrics
                .requests_total
                .with_label_values(&["success_honest"])
                .inc();
            origin_status as u32
        } else {
            let idx = rand::random::<usize>() % DECEPTIVE_STATUSES.len();
            let fake = DECEPTIVE_STATUSES[idx];
            self.state
                .metrics
                .deception_events
                .with_label_values(&[&fake.to_string()])
                .inc();
            self.state
                .metrics
                .requests_total
                .with_label_values(&["success_deceptive"])
                .inc();
            fake
        }
    }
}

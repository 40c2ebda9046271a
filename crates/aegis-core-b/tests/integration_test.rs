//! End-to-end tests for Core-B: a real tonic server and a real axum
//! handshake server, talking to a mock origin app, all on random ports.

use aegis_core_b::config::CoreBConfig;
use aegis_core_b::grpc::AegisGatewayService;
use aegis_core_b::{http, AppState};
use aegis_crypto::{canonical_associated_data, CryptoEngine};
use aegis_proto::aegis_gateway_client::AegisGatewayClient;
use aegis_proto::aegis_gateway_server::AegisGatewayServer;
use aegis_proto::inner::{InnerRequest, InnerResponse};
use axum::{routing::get, Json, Router};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Channel;

fn find_free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn start_mock_origin() -> u16 {
    let port = find_free_port();
    let router = Router::new().route(
        "/echo",
        get(|| async { Json(json!({ "hello": "origin" })) }),
    );
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    port
}

async fn start_core_b(target_app_url: String, session_ttl: Duration) -> (u16, u16, Arc<aegis_core_b::AppState>) {
    let http_port = find_free_port();
    let grpc_port = find_free_port();

    let config = CoreBConfig {
        target_app_url,
        grpc_port,
        core_b_http_port: http_port,
        session_ttl,
        log: "error".to_string(),
    };
    let state = Arc::new(AppState::new(config));

    let http_router = http::router(state.clone());
    let http_listener = tokio::net::TcpListener::bind(("127.0.0.1", http_port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(http_listener, http_router).await.ok();
    });

    let grpc_state = state.clone();
    tokio::spawn(async move {
        let service = AegisGatewayService { state: grpc_state };
        tonic::transport::Server::builder()
            .add_service(AegisGatewayServer::new(service))
            .serve(([127, 0, 0, 1], grpc_port).into())
            .await
            .ok();
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    (http_port, grpc_port, state)
}

async fn grpc_client(grpc_port: u16) -> AegisGatewayClient<Channel> {
    let channel = Channel::from_shared(format!("http://127.0.0.1:{grpc_port}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    AegisGatewayClient::new(channel)
}

#[tokio::test]
async fn handshake_and_process_round_trip_hits_origin() {
    let origin_port = start_mock_origin().await;
    let (http_port, grpc_port, _state) = start_core_b(
        format!("http://127.0.0.1:{origin_port}"),
        Duration::from_secs(600),
    )
    .await;

    let core_a_crypto = CryptoEngine::init();
    let peer_pem = reqwest::get(format!("http://127.0.0.1:{http_port}/public-key"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let session_key = core_a_crypto.derive_shared_key(&peer_pem).unwrap();

    let inner_request = InnerRequest {
        method: "GET".to_string(),
        path: "/echo".to_string(),
        headers: BTreeMap::new(),
        body: String::new(),
    };
    let payload = serde_json::to_vec(&inner_request).unwrap();

    let mut metadata = BTreeMap::new();
    metadata.insert("trace_id".to_string(), "test-trace".to_string());
    let ad = canonical_associated_data(&metadata);
    let envelope = CryptoEngine::seal(&session_key, &payload, &ad).unwrap();

    let mut client = grpc_client(grpc_port).await;
    let response = client
        .process(aegis_proto::AegisRequest {
            encrypted_payload: envelope,
            public_key: core_a_crypto.public_key_pem().as_bytes().to_vec(),
            metadata: metadata.into_iter().collect(),
        })
        .await
        .unwrap()
        .into_inner();

    let response_metadata: BTreeMap<String, String> = response.metadata.into_iter().collect();
    assert_ne!(response_metadata.get("error").map(String::as_str), Some("true"));
    let response_ad = canonical_associated_data(&response_metadata);
    let plaintext = CryptoEngine::open(&session_key, &response.encrypted_payload, &response_ad).unwrap();
    let inner_response: InnerResponse = serde_json::from_slice(&plaintext).unwrap();

    assert_eq!(inner_response.status_code, 200);
    let body = BASE64.decode(&inner_response.body).unwrap();
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["hello"], "origin");
}

#[tokio::test]
async fn expired_session_is_rejected_then_evicted() {
    let origin_port = start_mock_origin().await;
    let (http_port, grpc_port, _state) = start_core_b(
        format!("http://127.0.0.1:{origin_port}"),
        Duration::from_millis(100),
    )
    .await;

    let core_a_crypto = CryptoEngine::init();
    let peer_pem = reqwest::get(format!("http://127.0.0.1:{http_port}/public-key"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let session_key = core_a_crypto.derive_shared_key(&peer_pem).unwrap();

    let inner_request = InnerRequest {
        method: "GET".to_string(),
        path: "/echo".to_string(),
        headers: BTreeMap::new(),
        body: String::new(),
    };
    let payload = serde_json::to_vec(&inner_request).unwrap();
    let metadata: BTreeMap<String, String> = BTreeMap::new();
    let ad = canonical_associated_data(&metadata);
    let envelope = CryptoEngine::seal(&session_key, &payload, &ad).unwrap();

    let mut client = grpc_client(grpc_port).await;

    // First call establishes the session.
    client
        .process(aegis_proto::AegisRequest {
            encrypted_payload: envelope.clone(),
            public_key: core_a_crypto.public_key_pem().as_bytes().to_vec(),
            metadata: metadata.clone().into_iter().collect(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = client
        .process(aegis_proto::AegisRequest {
            encrypted_payload: envelope,
            public_key: core_a_crypto.public_key_pem().as_bytes().to_vec(),
            metadata: metadata.into_iter().collect(),
        })
        .await;

    let status = second.unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);
}

#[tokio::test]
async fn tampered_envelope_yields_fake_400_with_empty_payload() {
    let origin_port = start_mock_origin().await;
    let (http_port, grpc_port, _state) = start_core_b(
        format!("http://127.0.0.1:{origin_port}"),
        Duration::from_secs(600),
    )
    .await;

    let core_a_crypto = CryptoEngine::init();
    let peer_pem = reqwest::get(format!("http://127.0.0.1:{http_port}/public-key"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let session_key = core_a_crypto.derive_shared_key(&peer_pem).unwrap();

    let inner_request = InnerRequest {
        method: "GET".to_string(),
        path: "/echo".to_string(),
        headers: BTreeMap::new(),
        body: String::new(),
    };
    let payload = serde_json::to_vec(&inner_request).unwrap();
    let metadata: BTreeMap<String, String> = BTreeMap::new();
    let ad = canonical_associated_data(&metadata);
    let mut envelope = CryptoEngine::seal(&session_key, &payload, &ad).unwrap();
    let last = envelope.len() - 1;
    envelope[last] ^= 0xFF;

    let mut client = grpc_client(grpc_port).await;
    let response = client
        .process(aegis_proto::AegisRequest {
            encrypted_payload: envelope,
            public_key: core_a_crypto.public_key_pem().as_bytes().to_vec(),
            metadata: metadata.into_iter().collect(),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.fake_http_status, 400);
    assert!(response.encrypted_payload.is_empty());
}

#[tokio::test]
async fn garbage_public_key_on_a_fresh_session_is_unauthenticated() {
    let origin_port = start_mock_origin().await;
    let (_http_port, grpc_port, _state) = start_core_b(
        format!("http://127.0.0.1:{origin_port}"),
        Duration::from_secs(600),
    )
    .await;

    let mut client = grpc_client(grpc_port).await;
    let response = client
        .process(aegis_proto::AegisRequest {
            encrypted_payload: vec![0u8; 32],
            public_key: b"not a pem key".to_vec(),
            metadata: BTreeMap::new().into_iter().collect(),
        })
        .await;

    let status = response.unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unauthenticated);
}

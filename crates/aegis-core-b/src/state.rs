use crate::config::CoreBConfig;
use crate::metrics::Metrics;
use aegis_crypto::CryptoEngine;
use aegis_session::SessionStore;
use std::sync::Arc;

/// Shared state handed to both the axum HTTP server and the tonic gRPC
/// server. Both halves of Core-B read the same crypto engine and session
/// store; neither owns the other's lifetime.
pub struct AppState {
    pub crypto: CryptoEngine,
    pub sessions: SessionStore,
    pub metrics: Metrics,
    pub origin_client: reqwest::Client,
    pub config: CoreBConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: CoreBConfig) -> Self {
        Self {
            crypto: CryptoEngine::init(),
            sessions: SessionStore::new(config.session_ttl),
            metrics: Metrics::new(),
            origin_client: reqwest::Client::new(),
            config,
        }
    }
}

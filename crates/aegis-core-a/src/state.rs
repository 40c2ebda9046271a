use crate::config::CoreAConfig;
use aegis_crypto::{CryptoEngine, SessionKey};
use aegis_proto::aegis_gateway_client::AegisGatewayClient;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::transport::Channel;

/// Shared application state for Core-A. The session key cell is a single
/// memory cell behind an `RwLock`: concurrent readers during re-handshake
/// may observe the old or new key, which is fine — a stale read simply
/// triggers the `UNAUTHENTICATED` retry path (workspace spec §4.2/§5).
pub struct AppState {
    pub crypto: CryptoEngine,
    pub session_key: RwLock<Option<SessionKey>>,
    pub http_client: reqwest::Client,
    pub rpc_client: RwLock<AegisGatewayClient<Channel>>,
    pub config: CoreAConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: CoreAConfig,
        http_client: reqwest::Client,
        rpc_client: AegisGatewayClient<Channel>,
    ) -> Self {
        Self {
            crypto: CryptoEngine::init(),
            session_key: RwLock::new(None),
            http_client,
            rpc_client: RwLock::new(rpc_client),
            config,
        }
    }
}

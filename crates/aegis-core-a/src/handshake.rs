//! Bootstrap and re-handshake logic (workspace spec §4.2 "Bootstrap
//! sequence" and §4.5 "Session lifecycle").

use crate::state::SharedState;
use aegis_proto::HealthCheckRequest;
use std::time::Duration;
use tracing::{info, warn};

const HEALTH_PROBE_ATTEMPTS: u32 = 10;
const HEALTH_PROBE_INTERVAL: Duration = Duration::from_secs(1);
const HEALTH_PROBE_DEADLINE: Duration = Duration::from_secs(1);
const HANDSHAKE_HTTP_DEADLINE: Duration = Duration::from_secs(5);

/// Polls Core-B's gRPC health check until it reports `SERVING`, up to
/// [`HEALTH_PROBE_ATTEMPTS`] times, sleeping [`HEALTH_PROBE_INTERVAL`]
/// between attempts. Returns `false` if Core-B never became ready.
pub async fn wait_for_grpc_server(state: &SharedState) -> bool {
    for attempt in 1..=HEALTH_PROBE_ATTEMPTS {
        let mut client = state.rpc_client.write().await.clone();
        let call = tokio::time::timeout(HEALTH_PROBE_DEADLINE, client.health_check(HealthCheckRequest {}));
        match call.await {
            Ok(Ok(response)) => {
                if response.into_inner().status == aegis_proto::health_check_response::ServingStatus::Serving as i32 {
                    info!("Core-B gRPC server is ready");
                    return true;
                }
            }
            Ok(Err(e)) => warn!(attempt, error = %e, "Core-B health check returned an error"),
            Err(_) => warn!(attempt, "Core-B health check timed out"),
        }
        tokio::time::sleep(HEALTH_PROBE_INTERVAL).await;
    }
    false
}

/// Fetches Core-B's public key over HTTP and derives the session key from
/// it, replacing whatever key (if any) was held before. Returns `false` on
/// any transport or crypto failure, leaving the previous key untouched so a
/// concurrent in-flight request can still use it.
pub async fn perform_handshake(state: &SharedState) -> bool {
    let url = format!("{}/public-key", state.config.core_b_http_url);
    let response = match state
        .http_client
        .get(&url)
        .timeout(HANDSHAKE_HTTP_DEADLINE)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to fetch Core-B public key");
            return false;
        }
    };

    let peer_public_key_pem = match response.error_for_status() {
        Ok(r) => match r.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "failed to read Core-B public key response body");
                return false;
            }
        },
        Err(e) => {
            warn!(error = %e, "Core-B public-key endpoint returned an error status");
            return false;
        }
    };

    match state.crypto.derive_shared_key(&peer_public_key_pem) {
        Ok(key) => {
            *state.session_key.write().await = Some(key);
            info!("session key established (handshake complete)");
            true
        }
        Err(e) => {
            warn!(error = %e, "failed to derive session key from Core-B's public key");
            false
        }
    }
}

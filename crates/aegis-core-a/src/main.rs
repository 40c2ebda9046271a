use aegis_core_a::config::{Args, CoreAConfig};
use aegis_core_a::handshake::{perform_handshake, wait_for_grpc_server};
use aegis_core_a::proxy;
use aegis_core_a::AppState;
use aegis_proto::aegis_gateway_client::AegisGatewayClient;
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::Endpoint;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CoreAConfig::from(args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        core_b_grpc_target = %config.core_b_grpc_target,
        core_b_http_url = %config.core_b_http_url,
        max_request_size = config.max_request_size,
        "Core-A starting"
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let endpoint = Endpoint::from_shared(format!("http://{}", config.core_b_grpc_target))?
        .connect_timeout(Duration::from_secs(5));
    let channel = endpoint.connect_lazy();
    let rpc_client = AegisGatewayClient::new(channel);

    let state: aegis_core_a::SharedState = Arc::new(AppState::new(config.clone(), http_client, rpc_client));

    if wait_for_grpc_server(&state).await {
        if !perform_handshake(&state).await {
            warn!("initial handshake failed; will retry lazily on first request");
        }
    } else {
        warn!("Core-B gRPC server did not become ready during bootstrap; continuing anyway");
    }

    let router = proxy::router(state);

    let addr = format!("{}:{}", config.core_a_host, config.core_a_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Core-A HTTP (client-facing) listening");
    axum::serve(listener, router).await?;

    Ok(())
}

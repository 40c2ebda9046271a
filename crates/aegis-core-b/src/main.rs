use aegis_core_b::config::{Args, CoreBConfig};
use aegis_core_b::grpc::AegisGatewayService;
use aegis_core_b::{http, AppState};
use aegis_proto::aegis_gateway_server::AegisGatewayServer;
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CoreBConfig::from(args);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(
        target_app_url = %config.target_app_url,
        grpc_port = config.grpc_port,
        http_port = config.core_b_http_port,
        session_ttl_secs = config.session_ttl.as_secs(),
        "Core-B starting"
    );

    let state: aegis_core_b::SharedState = Arc::new(AppState::new(config.clone()));

    let http_addr = format!("0.0.0.0:{}", config.core_b_http_port).parse()?;
    let grpc_addr = format!("0.0.0.0:{}", config.grpc_port).parse()?;

    let http_server = {
        let router = http::router(state.clone());
        async move {
            let listener = tokio::net::TcpListener::bind(http_addr).await?;
            info!(addr = %http_addr, "Core-B HTTP (handshake/health/metrics) listening");
            axum::serve(listener, router).await?;
            Ok::<_, anyhow::Error>(())
        }
    };

    let grpc_server = {
        let service = AegisGatewayService { state: state.clone() };
        async move {
            info!(addr = %grpc_addr, "Core-B gRPC (AegisGateway) listening");
            tonic::transport::Server::builder()
                .add_service(AegisGatewayServer::new(service))
                .serve(grpc_addr)
                .await?;
            Ok::<_, anyhow::Error>(())
        }
    };

    tokio::try_join!(http_server, grpc_server)?;
    Ok(())
}

use clap::Parser;
use std::time::Duration;

const DEFAULT_TARGET_APP_URL: &str = "http://localhost:8081";
const DEFAULT_GRPC_PORT: u16 = 50052;
const DEFAULT_HTTP_PORT: u16 = 8001;
const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// CLI/env wiring for Core-B. Every field mirrors an env var named in the
/// workspace spec §6; clap's `env = "..."` attribute makes the env var the
/// fallback for an unset flag, matching the `Args` struct convention in the
/// teacher daemon's `main.rs`.
#[derive(Parser, Debug)]
#[command(name = "aegis-core-b", about = "Aegis Core-B — egress gateway node")]
pub struct Args {
    /// Origin application base URL that decrypted requests are replayed against.
    #[arg(long, env = "TARGET_APP_URL", default_value = DEFAULT_TARGET_APP_URL)]
    pub target_app_url: String,

    /// Port the tonic gRPC server listens on.
    #[arg(long, env = "GRPC_PORT", default_value_t = DEFAULT_GRPC_PORT)]
    pub grpc_port: u16,

    /// Port the handshake/health/metrics HTTP server listens on.
    #[arg(long, env = "CORE_B_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub core_b_http_port: u16,

    /// Session record lifetime, in seconds, before forced re-handshake.
    #[arg(long, env = "SESSION_TTL", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl: u64,

    /// Log level filter (e.g. "info", "debug", "aegis_core_b=trace").
    #[arg(long, env = "CORE_B_LOG", default_value = "info")]
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct CoreBConfig {
    pub target_app_url: String,
    pub grpc_port: u16,
    pub core_b_http_port: u16,
    pub session_ttl: Duration,
    pub log: String,
}

impl From<Args> for CoreBConfig {
    fn from(args: Args) -> Self {
        Self {
            target_app_url: args.target_app_url.trim_end_matches('/').to_string(),
            grpc_port: args.grpc_port,
            core_b_http_port: args.core_b_http_port,
            session_ttl: Duration::from_secs(args.session_ttl),
            log: args.log,
        }
    }
}

use clap::Parser;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRPC_TARGET: &str = "localhost:50052";
const DEFAULT_HTTP_URL: &str = "http://localhost:8001";
const DEFAULT_MAX_REQUEST_SIZE: usize = 10 * 1024 * 1024;

/// CLI/env wiring for Core-A, one field per env var named in workspace
/// spec §6, following the teacher daemon's `Args` struct convention
/// (clap derive + `env = "..."`).
#[derive(Parser, Debug)]
#[command(name = "aegis-core-a", about = "Aegis Core-A — ingress gateway node")]
pub struct Args {
    #[arg(long, env = "CORE_A_HOST", default_value = DEFAULT_HOST)]
    pub core_a_host: String,

    #[arg(long, env = "CORE_A_PORT", default_value_t = DEFAULT_PORT)]
    pub core_a_port: u16,

    /// Core-B gRPC target, e.g. `localhost:50052`.
    #[arg(long, env = "CORE_B_GRPC_TARGET", default_value = DEFAULT_GRPC_TARGET)]
    pub core_b_grpc_target: String,

    /// Core-B HTTP base URL used to fetch `/public-key`.
    #[arg(long, env = "CORE_B_HTTP_URL", default_value = DEFAULT_HTTP_URL)]
    pub core_b_http_url: String,

    /// Maximum accepted client request body size, in bytes.
    #[arg(long, env = "MAX_REQUEST_SIZE", default_value_t = DEFAULT_MAX_REQUEST_SIZE)]
    pub max_request_size: usize,

    /// Log level filter.
    #[arg(long, env = "CORE_A_LOG", default_value = "info")]
    pub log: String,
}

#[derive(Debug, Clone)]
pub struct CoreAConfig {
    pub core_a_host: String,
    pub core_a_port: u16,
    pub core_b_grpc_target: String,
    pub core_b_http_url: String,
    pub max_request_size: usize,
    pub log: String,
}

impl From<Args> for CoreAConfig {
    fn from(args: Args) -> Self {
        Self {
            core_a_host: args.core_a_host,
            core_a_port: args.core_a_port,
            core_b_grpc_target: args.core_b_grpc_target,
            core_b_http_url: args.core_b_http_url.trim_end_matches('/').to_string(),
            max_request_size: args.max_request_size,
            log: args.log,
        }
    }
}

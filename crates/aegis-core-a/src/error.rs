use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Local error taxonomy for the proxy pipeline, each variant mapping to the
/// exact status code workspace spec §4.2/§7 assigns it.
#[derive(Debug, Error)]
pub enum CoreAError {
    #[error("Payload Too Large")]
    PayloadTooLarge,
    #[error("Invalid Content-Length")]
    InvalidContentLength,
    #[error("Core A is not ready: session key establishment failed.")]
    NotReady,
    #[error("gRPC Error: {0}")]
    RpcUnavailable(String),
    #[error("Secure Channel Error: Bad Response")]
    BadResponseEnvelope,
    #[error("Bad Gateway: origin unreachable")]
    OriginUnreachable,
}

impl IntoResponse for CoreAError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreAError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            CoreAError::InvalidContentLength => StatusCode::BAD_REQUEST,
            CoreAError::NotReady | CoreAError::RpcUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoreAError::BadResponseEnvelope | CoreAError::OriginUnreachable => StatusCode::BAD_GATEWAY,
        };
        (status, self.to_string()).into_response()
    }
}

pub mod config;
pub mod error;
pub mod grpc;
pub mod http;
pub mod metrics;
pub mod state;

pub use config::CoreBConfig;
pub use state::{AppState, SharedState};

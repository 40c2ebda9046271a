pub mod config;
pub mod error;
pub mod handshake;
pub mod proxy;
pub mod state;

pub use config::CoreAConfig;
pub use state::{AppState, SharedState};

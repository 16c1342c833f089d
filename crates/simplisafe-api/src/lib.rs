// simplisafe-api: Async Rust client for the SimpliSafe cloud (REST + realtime socket)

pub mod auth;
pub mod error;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use auth::{AccessToken, TokenManager, TokenPair, TokenRefreshed};
pub use error::Error;
pub use rest::ApiClient;
pub use transport::TransportConfig;

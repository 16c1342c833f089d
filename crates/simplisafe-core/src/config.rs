// ── Runtime client configuration ──
//
// These types describe *how* to talk to the SimpliSafe cloud. They carry
// credentials and tuning, but never touch disk. The CLI (or any other
// consumer) builds a `ClientConfig` and hands it to the facade.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use simplisafe_api::transport::{DEFAULT_API_BASE, DEFAULT_WEBSOCKET_URL, TransportConfig};
use simplisafe_api::websocket::ReconnectConfig;

use crate::error::CoreError;

/// How to authenticate.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Email + password (password grant).
    Credentials {
        username: String,
        password: SecretString,
    },
    /// A refresh token persisted from a previous session.
    RefreshToken(SecretString),
}

/// Tuning for a SimpliSafe session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST root, e.g. `https://api.simplisafe.com/v1/`.
    pub api_base_url: Url,
    /// Socket.IO endpoint for realtime events.
    pub websocket_url: Url,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// How long arm/disarm commands wait for the panel to confirm.
    pub confirm_timeout: Duration,
    /// Interval between state polls while waiting for confirmation.
    pub poll_interval: Duration,
    /// Realtime reconnect backoff.
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            websocket_url: Url::parse(DEFAULT_WEBSOCKET_URL)
                .expect("default realtime URL is a valid URL"),
            timeout: Duration::from_secs(30),
            confirm_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Point REST traffic at a different base URL (mock servers, staging).
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_base_url(url)?;
        self.api_base_url = transport.base_url;
        Ok(self)
    }

    /// Point the realtime channel at a different socket endpoint.
    pub fn with_websocket_url(mut self, url: &str) -> Result<Self, CoreError> {
        self.websocket_url =
            Url::parse(url).map_err(|e| CoreError::Internal(format!("Invalid URL: {e}")))?;
        Ok(self)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.api_base_url.clone(),
            timeout: self.timeout,
            ..TransportConfig::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE);
        assert_eq!(config.confirm_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn base_url_override_normalizes_slash() {
        let config = ClientConfig::default()
            .with_api_base_url("http://127.0.0.1:8080/v1")
            .unwrap();
        assert_eq!(config.transport().base_url.as_str(), "http://127.0.0.1:8080/v1/");
    }
}

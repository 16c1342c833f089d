// Shared transport configuration for building reqwest::Client instances.
//
// The token manager and the REST client share one `reqwest::Client`, so
// timeouts, user agent, and base URL are configured in exactly one place.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Production REST base URL.
pub const DEFAULT_API_BASE: &str = "https://api.simplisafe.com/v1/";

/// Production realtime socket endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://api.simplisafe.com/socket.io/";

/// User agent the mobile app sends; the backend rejects some unknown agents.
pub const DEFAULT_USER_AGENT: &str = "SimpliSafe/2105 CFNetwork/902.2 Darwin/17.7.0";

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// REST root. Every endpoint path is joined onto this URL, so it must
    /// end with a trailing slash.
    pub base_url: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_BASE).expect("default API base is a valid URL"),
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl TransportConfig {
    /// Config pointing at a custom base URL (mock servers, staging).
    ///
    /// A missing trailing slash is added so `Url::join` keeps the path.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, Error> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_owned()
        } else {
            format!("{base_url}/")
        };
        self.base_url = Url::parse(&normalized)?;
        Ok(self)
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(Error::from)
    }

    /// Resolve an endpoint path against the base URL.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }
}

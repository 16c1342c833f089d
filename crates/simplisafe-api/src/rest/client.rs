// REST API HTTP client
//
// Wraps `reqwest::Client` with bearer authentication from the token
// manager and the single 401-driven refresh-and-retry. Endpoint modules
// (subscriptions, system, devices, ...) are inherent methods in separate
// files so this module stays focused on transport mechanics.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::auth::TokenManager;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Authenticated HTTP client for the SimpliSafe REST API.
///
/// Every request carries the current access token. A 401 triggers one
/// refresh of the token that was rejected, then one retry; a second 401
/// surfaces as [`Error::SessionExpired`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    transport: TransportConfig,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// Create a client sharing the token manager's HTTP client.
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            http: tokens.http().clone(),
            transport: tokens.transport().clone(),
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Account id of the logged-in user.
    pub fn user_id(&self) -> Result<u64, Error> {
        self.tokens.user_id().ok_or(Error::NotAuthenticated)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Issue an authenticated request and decode the body as JSON.
    ///
    /// An empty response body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = self.transport.endpoint_url(endpoint)?;
        let mut retried = false;

        loop {
            let token = self.tokens.access_token().await?;
            debug!("{} {}", method, endpoint);

            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(token.secret.expose_secret());
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let resp = builder.send().await?;
            let status = resp.status();

            if status == StatusCode::UNAUTHORIZED {
                if retried {
                    warn!(endpoint, "access token rejected again after refresh");
                    return Err(Error::SessionExpired {
                        endpoint: endpoint.to_owned(),
                    });
                }
                warn!(endpoint, "access token rejected, refreshing");
                self.tokens.refresh_from(token.generation).await?;
                retried = true;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::Request {
                    endpoint: endpoint.to_owned(),
                    status: status.as_u16(),
                    body,
                });
            }

            let text = resp.text().await?;
            trace!(endpoint, bytes = text.len(), "response received");
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: format!("{endpoint}: {e} (body preview: {:?})", preview(&text)),
                body: text.clone(),
            });
        }
    }

    /// GET an endpoint and decode into `T`.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let value = self.request(Method::GET, endpoint, query, None).await?;
        decode(endpoint, value)
    }

    /// POST an endpoint (optionally with a JSON body) and decode into `T`.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let value = self.request(Method::POST, endpoint, query, body).await?;
        decode(endpoint, value)
    }
}

/// First 200 characters of a body, cut on a char boundary.
fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, Error> {
    serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
        message: format!("{endpoint}: {e}"),
        body: value.to_string(),
    })
}

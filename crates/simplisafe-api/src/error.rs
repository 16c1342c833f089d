use std::sync::Arc;

use thiserror::Error;

/// Top-level error type for the `simplisafe-api` crate.
///
/// Covers every failure mode across the API surfaces: token exchange,
/// transport, REST endpoints, and the realtime socket. `simplisafe-core`
/// maps these into its own domain errors.
///
/// The type is `Clone` so a single refresh failure can be handed to every
/// caller that was waiting on the same in-flight refresh.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Username/password rejected by the token endpoint.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// The refresh token was rejected (expired, revoked, or already rotated).
    /// The caller must log in again from scratch.
    #[error("Refresh token expired or invalid: {message}")]
    InvalidRefreshToken { message: String },

    /// The backend kept rejecting the access token after a fresh refresh.
    #[error("Session expired -- re-authentication required ({endpoint})")]
    SessionExpired { endpoint: String },

    /// No token pair has been acquired yet.
    #[error("Not authenticated -- call login first")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── REST ────────────────────────────────────────────────────────
    /// Non-2xx response from a REST endpoint.
    #[error("Request to {endpoint} failed (HTTP {status}): {body}")]
    Request {
        endpoint: String,
        status: u16,
        body: String,
    },

    // ── Realtime socket ─────────────────────────────────────────────
    /// Socket connection or handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Socket closed by the server.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl Error {
    /// Returns `true` if the session is gone and a fresh login is required.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. }
                | Self::InvalidRefreshToken { .. }
                | Self::SessionExpired { .. }
                | Self::NotAuthenticated
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Request { status, .. } => *status == 429 || *status >= 500,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_require_login() {
        assert!(
            Error::InvalidRefreshToken {
                message: "invalid_grant".into()
            }
            .requires_login()
        );
        assert!(Error::NotAuthenticated.requires_login());
        assert!(
            !Error::Request {
                endpoint: "api/authCheck".into(),
                status: 500,
                body: String::new(),
            }
            .requires_login()
        );
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Request {
            endpoint: "users/1/subscriptions".into(),
            status: 503,
            body: "unavailable".into(),
        };
        assert!(err.is_transient());

        let err = Error::Request {
            endpoint: "users/1/subscriptions".into(),
            status: 404,
            body: String::new(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn socket_failures_are_transient() {
        assert!(Error::WebSocketConnect("connection refused".into()).is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1001,
                reason: "going away".into()
            }
            .is_transient()
        );
        assert!(!Error::NotAuthenticated.is_transient());
        assert!(
            !Error::Deserialization {
                message: "token response".into(),
                body: String::new()
            }
            .is_transient()
        );
    }
}

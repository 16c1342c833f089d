// ── Core error types ──
//
// User-facing errors from simplisafe-core. The `From<simplisafe_api::Error>`
// impl translates transport-layer errors into domain variants; callers match
// on these, never on raw HTTP or JSON failures.

use std::time::Duration;

use thiserror::Error;

/// Why a PIN operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("PIN must be exactly 4 digits")]
    InvalidFormat,

    #[error("PIN {value} is already in use")]
    Duplicate { value: String },

    #[error("maximum of {max} user PINs already set")]
    LimitReached { max: usize },

    #[error("the {label} PIN cannot be removed")]
    Reserved { label: String },

    #[error("no PIN matches {0:?}")]
    NotFound(String),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// The refresh token (or the session behind it) is gone; log in again.
    #[error("Refresh token expired or invalid: {message}")]
    InvalidRefreshToken { message: String },

    // ── Backend errors ───────────────────────────────────────────────
    #[error("Request to {endpoint} failed (HTTP {status}): {body}")]
    Request {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Cannot reach SimpliSafe: {reason}")]
    Connection { reason: String },

    // ── Domain errors ────────────────────────────────────────────────
    #[error("PIN error: {0}")]
    Pin(#[from] PinError),

    #[error("System did not reach {target} within {}s", .timeout.as_secs())]
    CommandTimeout { target: String, timeout: Duration },

    #[error("Command rejected by the system: {message}")]
    CommandRejected { message: String },

    #[error("No events found for system {system_id}")]
    NoEvents { system_id: u64 },

    #[error("Unsupported system version {version} for system {system_id}")]
    UnsupportedSystemVersion { system_id: u64, version: u8 },

    #[error("System not found: {system_id}")]
    SystemNotFound { system_id: u64 },

    #[error("No entity with serial {serial}")]
    EntityNotFound { serial: String },

    #[error("Invalid setting value: {message}")]
    InvalidSetting { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the caller must log in again from scratch.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::InvalidRefreshToken { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<simplisafe_api::Error> for CoreError {
    fn from(err: simplisafe_api::Error) -> Self {
        use simplisafe_api::Error as Api;

        match err {
            Api::InvalidCredentials { message } => Self::InvalidCredentials { message },
            Api::InvalidRefreshToken { message } => Self::InvalidRefreshToken { message },
            Api::SessionExpired { endpoint } => Self::InvalidRefreshToken {
                message: format!("access token rejected after refresh ({endpoint})"),
            },
            Api::NotAuthenticated => Self::InvalidRefreshToken {
                message: "no active session".into(),
            },
            Api::Request {
                endpoint,
                status,
                body,
            } => Self::Request {
                endpoint,
                status,
                body,
            },
            Api::Transport(e) => Self::Connection {
                reason: e.to_string(),
            },
            Api::WebSocketConnect(reason) => Self::Connection {
                reason: format!("realtime socket: {reason}"),
            },
            Api::WebSocketClosed { code, reason } => Self::Connection {
                reason: format!("realtime socket closed (code {code}): {reason}"),
            },
            Api::InvalidUrl(e) => Self::Internal(format!("Invalid URL: {e}")),
            Api::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

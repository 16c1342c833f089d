//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use simplisafe_config::ConfigError;
use simplisafe_core::{CoreError, PinError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach SimpliSafe: {reason}")]
    #[diagnostic(
        code(simplisafe::connection_failed),
        help("Check your network connection, or the base_url of the profile.")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(simplisafe::auth_failed),
        help(
            "Verify the email and password for profile '{profile}'.\n\
             A stale cached token can be dropped with: simplisafe config logout"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(simplisafe::no_credentials),
        help(
            "Set SIMPLISAFE_PASSWORD, or point password_env at a variable in the profile.\n\
             Run: simplisafe config init --email you@example.com --password-env MY_VAR"
        )
    )]
    NoCredentials { profile: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(simplisafe::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: simplisafe config init --email you@example.com"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No account configured")]
    #[diagnostic(
        code(simplisafe::no_config),
        help(
            "Create a profile with: simplisafe config init --email you@example.com\n\
             Or pass --email. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(simplisafe::config))]
    Config(String),

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(simplisafe::not_found),
        help("Run: simplisafe {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' is already in use")]
    #[diagnostic(code(simplisafe::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    #[error("'{operation}' is not supported on this system")]
    #[diagnostic(code(simplisafe::unsupported), help("This command requires {required}."))]
    Unsupported { operation: String, required: String },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("The system did not reach '{target}' within {seconds}s")]
    #[diagnostic(
        code(simplisafe::timeout),
        help("The command may still complete. Check with: simplisafe systems show")
    )]
    Timeout { target: String, seconds: u64 },

    #[error("The system rejected the command: {message}")]
    #[diagnostic(
        code(simplisafe::rejected),
        help("Open doors or windows, or an active alarm, can block arming.")
    )]
    Rejected { message: String },

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(simplisafe::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(simplisafe::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            Self::Unsupported { .. } | Self::Rejected { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredentials { message }
            | CoreError::InvalidRefreshToken { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::Connection { reason } => CliError::ConnectionFailed { reason },

            CoreError::Request {
                endpoint,
                status,
                body,
            } => CliError::ApiError {
                code: status.to_string(),
                message: format!("{endpoint}: {body}"),
            },

            CoreError::Pin(pin) => pin.into(),

            CoreError::CommandTimeout { target, timeout } => CliError::Timeout {
                target,
                seconds: timeout.as_secs(),
            },

            CoreError::CommandRejected { message } => CliError::Rejected { message },

            CoreError::NoEvents { system_id } => CliError::NotFound {
                resource_type: "events for system".into(),
                identifier: system_id.to_string(),
                list_command: "systems list".into(),
            },

            CoreError::UnsupportedSystemVersion { system_id, version } => CliError::Unsupported {
                operation: format!("system {system_id} (version {version})"),
                required: "a V2 or V3 SimpliSafe system".into(),
            },

            CoreError::SystemNotFound { system_id } => CliError::NotFound {
                resource_type: "system".into(),
                identifier: system_id.to_string(),
                list_command: "systems list".into(),
            },

            CoreError::EntityNotFound { serial } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: serial,
                list_command: "locks list".into(),
            },

            CoreError::InvalidSetting { message } => CliError::Validation {
                field: "setting".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<PinError> for CliError {
    fn from(err: PinError) -> Self {
        match err {
            PinError::Duplicate { value } => CliError::Conflict {
                resource_type: "PIN".into(),
                identifier: value,
            },
            PinError::NotFound(identifier) => CliError::NotFound {
                resource_type: "PIN".into(),
                identifier,
                list_command: "pins list".into(),
            },
            other @ (PinError::InvalidFormat
            | PinError::LimitReached { .. }
            | PinError::Reserved { .. }) => CliError::Validation {
                field: "pin".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                CliError::Config(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn command_errors_map_to_exit_codes() {
        let timeout: CliError = CoreError::CommandTimeout {
            target: "away".into(),
            timeout: Duration::from_secs(30),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);
        assert_eq!(timeout.to_string(), "The system did not reach 'away' within 30s");

        let auth: CliError = CoreError::InvalidRefreshToken {
            message: "revoked".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn pin_errors_are_specific() {
        let dup: CliError = CoreError::Pin(PinError::Duplicate {
            value: "1234".into(),
        })
        .into();
        assert_eq!(dup.exit_code(), exit_code::CONFLICT);

        let reserved: CliError = CoreError::Pin(PinError::Reserved {
            label: "master".into(),
        })
        .into();
        assert_eq!(reserved.exit_code(), exit_code::USAGE);
    }
}

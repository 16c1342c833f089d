//! Login for command handlers: profile lookup, cached-token reuse with
//! password fallback, and refresh-token persistence.

use std::io::IsTerminal;

use secrecy::SecretString;
use tracing::{debug, info, warn};

use simplisafe_config::{self as config, ConfigError, Profile, TokenCache};
use simplisafe_core::{AlarmSystem, ClientConfig, SimpliSafe, System, SystemV3};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// A logged-in session bound to one profile.
pub struct Session {
    client: SimpliSafe,
    profile_name: String,
    tokens: TokenCache,
}

impl Session {
    /// Resolve the active profile and log in.
    ///
    /// A cached refresh token is tried first; if the backend has revoked
    /// it, the cache is cleared and the password is used instead.
    pub async fn open(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = config::load_config()?;
        let profile_name = cfg.active_profile_name(global.profile.as_deref());

        let profile = match (cfg.profile(&profile_name), &global.email) {
            (Ok(profile), Some(email)) => Profile {
                email: email.clone(),
                ..profile.clone()
            },
            (Ok(profile), None) => profile.clone(),
            (Err(_), Some(email)) if global.profile.is_none() => Profile {
                email: email.clone(),
                password: None,
                password_env: None,
                base_url: None,
                timeout: None,
            },
            (Err(_), None) if global.profile.is_none() && cfg.profiles.is_empty() => {
                return Err(CliError::NoConfig {
                    path: config::config_path().display().to_string(),
                });
            }
            (Err(e), _) => return Err(e.into()),
        };

        let client_config = config::to_client_config(&cfg.defaults, &profile)?;
        let tokens = cfg.token_cache();
        let client = login(&tokens, &profile, &profile_name, client_config).await?;

        let session = Self {
            client,
            profile_name,
            tokens,
        };
        session.persist_token();
        Ok(session)
    }

    pub fn client(&self) -> &SimpliSafe {
        &self.client
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Save the refresh token if it rotated since the last save.
    pub fn finish(&self) {
        if self.client.is_refresh_token_dirty() {
            self.persist_token();
        }
    }

    fn persist_token(&self) {
        if let Some(token) = self.client.refresh_token() {
            save_token(&self.tokens, &self.profile_name, &token);
        }
    }

    // ── System selection ─────────────────────────────────────────────

    /// The system named by `--system`, or the only one on the account.
    pub async fn system(&self, requested: Option<u64>) -> Result<System, CliError> {
        let mut systems = self.client.get_systems().await?;

        if let Some(id) = requested {
            return systems.remove(&id).ok_or_else(|| CliError::NotFound {
                resource_type: "system".into(),
                identifier: id.to_string(),
                list_command: "systems list".into(),
            });
        }

        let mut ids: Vec<u64> = systems.keys().copied().collect();
        ids.sort_unstable();
        match ids.as_slice() {
            [] => Err(CliError::NotFound {
                resource_type: "system".into(),
                identifier: "(any)".into(),
                list_command: "systems list".into(),
            }),
            [only] => systems.remove(only).ok_or_else(|| {
                CliError::Config(format!("system {only} vanished during selection"))
            }),
            many => Err(CliError::Validation {
                field: "system".into(),
                reason: format!(
                    "the account has {} systems ({}); pass --system",
                    many.len(),
                    many.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }
}

/// The V3 half of a system, or an error naming the operation.
pub fn require_v3<'a>(system: &'a mut System, operation: &str) -> Result<&'a mut SystemV3, CliError> {
    let version = system.version();
    system.as_v3_mut().ok_or_else(|| CliError::Unsupported {
        operation: operation.into(),
        required: format!("a V3 system (this one is V{version})"),
    })
}

/// Save `token` for `profile`, logging instead of failing.
pub fn save_token(tokens: &TokenCache, profile: &str, token: &SecretString) {
    match tokens.save(profile, token) {
        Ok(()) => debug!(profile, "refresh token saved"),
        Err(e) => warn!(profile, error = %e, "could not cache refresh token"),
    }
}

async fn login(
    tokens: &TokenCache,
    profile: &Profile,
    profile_name: &str,
    client_config: ClientConfig,
) -> Result<SimpliSafe, CliError> {
    if let Some(token) = tokens.load(profile_name)? {
        match SimpliSafe::login_via_token(&token, client_config.clone()).await {
            Ok(client) => return Ok(client),
            Err(e) if e.requires_login() => {
                info!(profile = profile_name, "cached refresh token rejected, using password");
                tokens.clear(profile_name)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let password = password(profile, profile_name)?;
    SimpliSafe::login_via_credentials(&profile.email, &password, client_config)
        .await
        .map_err(|e| match CliError::from(e) {
            CliError::AuthFailed { message, .. } => CliError::AuthFailed {
                profile: profile_name.into(),
                message,
            },
            other => other,
        })
}

/// Configured password, or an interactive prompt on a terminal.
fn password(profile: &Profile, profile_name: &str) -> Result<SecretString, CliError> {
    match config::resolve_password(profile, profile_name) {
        Ok(password) => Ok(password),
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            let entered =
                rpassword::prompt_password(format!("SimpliSafe password for {}: ", profile.email))?;
            Ok(SecretString::from(entered))
        }
        Err(e) => Err(e.into()),
    }
}

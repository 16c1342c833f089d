// ── Session facade ──
//
// The entry point for library consumers: log in, discover systems, watch
// the refresh token, and open the realtime channel. Everything else hangs
// off the `System` values returned by `get_systems()`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use futures_util::future::try_join_all;
use secrecy::SecretString;
use tokio::sync::broadcast;
use tracing::{debug, info};

use simplisafe_api::{ApiClient, TokenManager, TokenRefreshed};

use crate::config::{AuthCredentials, ClientConfig};
use crate::error::CoreError;
use crate::model::{AlarmSystem, System, UpdateOptions};
use crate::realtime::RealtimeChannel;

/// An authenticated SimpliSafe session.
///
/// Only constructed through one of the `login_*` functions, so every
/// instance holds a valid token pair.
#[derive(Debug)]
pub struct SimpliSafe {
    api: ApiClient,
    config: ClientConfig,
    realtime: OnceLock<Arc<RealtimeChannel>>,
}

impl SimpliSafe {
    /// Log in with an email and password.
    pub async fn login_via_credentials(
        username: &str,
        password: &SecretString,
        config: ClientConfig,
    ) -> Result<Self, CoreError> {
        let tokens = TokenManager::new(config.transport())?;
        tokens.login(username, password).await?;
        info!(user_id = tokens.user_id(), "logged in with credentials");
        Ok(Self::from_tokens(tokens, config))
    }

    /// Resume a session from a refresh token saved earlier.
    ///
    /// The token is exchanged immediately; a revoked token fails here with
    /// [`CoreError::InvalidRefreshToken`].
    pub async fn login_via_token(
        refresh_token: &SecretString,
        config: ClientConfig,
    ) -> Result<Self, CoreError> {
        let tokens = TokenManager::new(config.transport())?;
        tokens.refresh(refresh_token).await?;
        info!(user_id = tokens.user_id(), "logged in with refresh token");
        Ok(Self::from_tokens(tokens, config))
    }

    /// Log in with whichever credential the caller has.
    pub async fn login(credentials: &AuthCredentials, config: ClientConfig) -> Result<Self, CoreError> {
        match credentials {
            AuthCredentials::Credentials { username, password } => {
                Self::login_via_credentials(username, password, config).await
            }
            AuthCredentials::RefreshToken(token) => Self::login_via_token(token, config).await,
        }
    }

    fn from_tokens(tokens: Arc<TokenManager>, config: ClientConfig) -> Self {
        Self {
            api: ApiClient::new(tokens),
            config,
            realtime: OnceLock::new(),
        }
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// Every active system on the account, keyed by system id, with
    /// settings and entities loaded.
    pub async fn get_systems(&self) -> Result<HashMap<u64, System>, CoreError> {
        let subscriptions = self.api.get_subscriptions().await?;
        debug!(count = subscriptions.len(), "discovered subscriptions");

        let mut systems = subscriptions
            .into_iter()
            .map(|sub| System::from_subscription(self.api.clone(), &self.config, sub))
            .collect::<Result<Vec<_>, _>>()?;

        // The subscription record was just fetched; skip it.
        let options = UpdateOptions {
            include_system: false,
            ..UpdateOptions::default()
        };
        try_join_all(systems.iter_mut().map(|system| system.update(options))).await?;

        Ok(systems
            .into_iter()
            .map(|system| (system.system_id(), system))
            .collect())
    }

    /// A single system by id.
    pub async fn get_system(&self, system_id: u64) -> Result<System, CoreError> {
        self.get_systems()
            .await?
            .remove(&system_id)
            .ok_or(CoreError::SystemNotFound { system_id })
    }

    // ── Tokens ───────────────────────────────────────────────────────

    pub fn user_id(&self) -> Option<u64> {
        self.api.tokens().user_id()
    }

    /// The current refresh token, for persisting between runs.
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.api.tokens().refresh_token()
    }

    /// `true` once after each background refresh rotated the refresh token.
    pub fn is_refresh_token_dirty(&self) -> bool {
        self.api.tokens().is_dirty()
    }

    /// Notified on every refresh-token rotation.
    pub fn subscribe_token_refresh(&self) -> broadcast::Receiver<TokenRefreshed> {
        self.api.tokens().subscribe()
    }

    // ── Realtime ─────────────────────────────────────────────────────

    /// The realtime channel for this session, created on first use. It
    /// does not connect until [`RealtimeChannel::connect`] is called.
    pub fn realtime(&self) -> Arc<RealtimeChannel> {
        Arc::clone(self.realtime.get_or_init(|| {
            Arc::new(RealtimeChannel::new(
                Arc::clone(self.api.tokens()),
                self.config.websocket_url.clone(),
                self.config.reconnect.clone(),
            ))
        }))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

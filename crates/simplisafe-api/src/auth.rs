// Token lifecycle: password login, refresh-token rotation, single-flight refresh.
//
// The backend issues a short-lived access token plus a single-use refresh
// token. Presenting a refresh token twice kills the session, so every
// refresh goes through one shared in-flight future per token generation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::transport::TransportConfig;

const TOKEN_ENDPOINT: &str = "api/token";
const AUTH_CHECK_ENDPOINT: &str = "api/authCheck";

/// Seconds shaved off the advertised lifetime so a token never expires mid-flight.
const EXPIRY_MARGIN_SECS: i64 = 60;

const REFRESH_CHANNEL_CAPACITY: usize = 16;

// ── Token types ──────────────────────────────────────────────────────

/// Access/refresh token pair plus the account it belongs to.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user_id: u64,
    pub expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// An access token tagged with the generation it was read from.
///
/// The generation lets a caller that got a 401 ask for a refresh of
/// *that* token, so late callers don't rotate a token that is already new.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub secret: SecretString,
    pub generation: u64,
}

/// Emitted on every refresh-token rotation so callers can persist it.
#[derive(Debug, Clone)]
pub struct TokenRefreshed {
    pub generation: u64,
    pub refresh_token: SecretString,
    pub user_id: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthCheckResponse {
    user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Password,
    RefreshToken,
}

impl Grant {
    fn as_str(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::RefreshToken => "refresh_token",
        }
    }
}

type SharedRefresh = Shared<BoxFuture<'static, Result<u64, Error>>>;

struct InFlight {
    generation: u64,
    future: SharedRefresh,
}

#[derive(Default)]
struct TokenState {
    tokens: Option<TokenPair>,
    generation: u64,
}

// ── TokenManager ─────────────────────────────────────────────────────

/// Owns the token pair for one session.
///
/// Always handled through an `Arc` because in-flight refreshes are
/// `'static` futures shared between callers.
pub struct TokenManager {
    http: reqwest::Client,
    transport: TransportConfig,
    client_id: Uuid,
    username: RwLock<Option<String>>,
    state: RwLock<TokenState>,
    inflight: Mutex<Option<InFlight>>,
    dirty: AtomicBool,
    refreshed_tx: broadcast::Sender<TokenRefreshed>,
}

impl TokenManager {
    /// Create a token manager with its own HTTP client.
    pub fn new(transport: TransportConfig) -> Result<Arc<Self>, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, transport))
    }

    /// Create a token manager around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, transport: TransportConfig) -> Arc<Self> {
        let (refreshed_tx, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Arc::new(Self {
            http,
            transport,
            client_id: Uuid::new_v4(),
            username: RwLock::new(None),
            state: RwLock::new(TokenState::default()),
            inflight: Mutex::new(None),
            dirty: AtomicBool::new(false),
            refreshed_tx,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Account id learned from `api/authCheck`, once logged in.
    pub fn user_id(&self) -> Option<u64> {
        self.read_state().tokens.as_ref().map(|t| t.user_id)
    }

    /// The current refresh token, for persistence across restarts.
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read_state()
            .tokens
            .as_ref()
            .map(|t| t.refresh_token.clone())
    }

    /// Current token generation. Bumped on every stored token pair.
    pub fn generation(&self) -> u64 {
        self.read_state().generation
    }

    /// Returns `true` exactly once after an implicit refresh rotated the
    /// refresh token; reading resets the flag.
    pub fn is_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Subscribe to refresh-token rotations.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenRefreshed> {
        self.refreshed_tx.subscribe()
    }

    // ── Login / explicit refresh ─────────────────────────────────────

    /// Exchange username + password for a token pair.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<TokenPair, Error> {
        info!("logging in with credentials");
        *self.username.write().expect("username lock poisoned") = Some(username.to_owned());

        let form = [
            ("grant_type", Grant::Password.as_str()),
            ("username", username),
            ("password", password.expose_secret()),
        ];
        let pair = self.exchange(&form, Grant::Password).await?;
        self.store(pair.clone(), false);
        debug!(user_id = pair.user_id, "login successful");
        Ok(pair)
    }

    /// Exchange an explicit refresh token (e.g. one persisted from a
    /// previous run) for a fresh pair.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenPair, Error> {
        info!("refreshing session from stored refresh token");
        let pair = self.refresh_with(refresh_token).await?;
        self.store(pair.clone(), false);
        Ok(pair)
    }

    // ── Single-flight refresh ────────────────────────────────────────

    /// Return a usable access token.
    ///
    /// Waits for any in-flight refresh first, then refreshes proactively
    /// if the stored token has passed its expiry.
    pub async fn access_token(self: &Arc<Self>) -> Result<AccessToken, Error> {
        let pending = self
            .inflight
            .lock()
            .expect("refresh slot poisoned")
            .as_ref()
            .map(|f| f.future.clone());
        if let Some(pending) = pending {
            debug!("waiting for in-flight token refresh");
            pending.await?;
        }

        let (generation, expired) = {
            let state = self.read_state();
            let tokens = state.tokens.as_ref().ok_or(Error::NotAuthenticated)?;
            (state.generation, tokens.is_expired())
        };

        if expired {
            debug!(generation, "access token expired, refreshing");
            self.refresh_from(generation).await?;
        }

        let state = self.read_state();
        let tokens = state.tokens.as_ref().ok_or(Error::NotAuthenticated)?;
        Ok(AccessToken {
            secret: tokens.access_token.clone(),
            generation: state.generation,
        })
    }

    /// Refresh the token pair that was current at `observed` generation.
    ///
    /// Concurrent callers with the same `observed` value share one request.
    /// Callers holding an already-superseded generation return immediately.
    pub async fn refresh_from(self: &Arc<Self>, observed: u64) -> Result<(), Error> {
        let future = {
            let mut slot = self.inflight.lock().expect("refresh slot poisoned");
            match slot.as_ref() {
                Some(inflight) if inflight.generation == observed => inflight.future.clone(),
                _ => {
                    let (current, refresh_token) = {
                        let state = self.read_state();
                        let token = state.tokens.as_ref().map(|t| t.refresh_token.clone());
                        (state.generation, token)
                    };
                    if current != observed {
                        debug!(observed, current, "token already rotated by another caller");
                        return Ok(());
                    }
                    let refresh_token = refresh_token.ok_or(Error::NotAuthenticated)?;

                    let this = Arc::clone(self);
                    let future = async move {
                        let result = this.run_refresh(&refresh_token).await;
                        this.clear_inflight(observed);
                        result
                    }
                    .boxed()
                    .shared();

                    *slot = Some(InFlight {
                        generation: observed,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await.map(|_| ())
    }

    async fn run_refresh(&self, refresh_token: &SecretString) -> Result<u64, Error> {
        info!("refreshing access token");
        match self.refresh_with(refresh_token).await {
            Ok(pair) => Ok(self.store(pair, true)),
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                Err(e)
            }
        }
    }

    fn clear_inflight(&self, generation: u64) {
        let mut slot = self.inflight.lock().expect("refresh slot poisoned");
        if slot.as_ref().is_some_and(|f| f.generation == generation) {
            *slot = None;
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn refresh_with(&self, refresh_token: &SecretString) -> Result<TokenPair, Error> {
        let username = self
            .username
            .read()
            .expect("username lock poisoned")
            .clone();

        let mut form = vec![
            ("grant_type", Grant::RefreshToken.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
        ];
        if let Some(ref username) = username {
            form.push(("username", username.as_str()));
        }

        self.exchange(&form, Grant::RefreshToken).await
    }

    /// Store a new pair, bump the generation, and (for rotations) publish it.
    fn store(&self, pair: TokenPair, implicit: bool) -> u64 {
        let generation = {
            let mut state = self.state.write().expect("token state poisoned");
            state.generation += 1;
            state.tokens = Some(pair.clone());
            state.generation
        };

        if implicit {
            self.dirty.store(true, Ordering::Release);
        }

        // No subscribers is fine -- persistence is opt-in.
        let _ = self.refreshed_tx.send(TokenRefreshed {
            generation,
            refresh_token: pair.refresh_token,
            user_id: pair.user_id,
            expires_at: pair.expires_at,
        });

        generation
    }

    /// POST the token endpoint, then resolve the account id.
    async fn exchange(&self, form: &[(&str, &str)], grant: Grant) -> Result<TokenPair, Error> {
        let url = self.transport.endpoint_url(TOKEN_ENDPOINT)?;
        debug!(grant = grant.as_str(), "POST {}", TOKEN_ENDPOINT);

        let resp = self
            .http
            .post(url)
            .basic_auth(self.basic_auth_username(), Some(""))
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match (status.as_u16(), grant) {
                (400 | 401 | 403, Grant::Password) => Error::InvalidCredentials { message: body },
                (400 | 401 | 403, Grant::RefreshToken) => {
                    Error::InvalidRefreshToken { message: body }
                }
                (code, _) => Error::Request {
                    endpoint: TOKEN_ENDPOINT.into(),
                    status: code,
                    body,
                },
            });
        }

        let body = resp.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("token response: {e}"),
                body: String::new(),
            })?;

        let access_token = SecretString::from(token.access_token);
        let user_id = self.auth_check(&access_token).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: SecretString::from(token.refresh_token),
            user_id,
            expires_at: Utc::now() + ChronoDuration::seconds(token.expires_in - EXPIRY_MARGIN_SECS),
        })
    }

    async fn auth_check(&self, access_token: &SecretString) -> Result<u64, Error> {
        let url = self.transport.endpoint_url(AUTH_CHECK_ENDPOINT)?;
        debug!("GET {}", AUTH_CHECK_ENDPOINT);

        let resp = self
            .http
            .get(url)
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Request {
                endpoint: AUTH_CHECK_ENDPOINT.into(),
                status: status.as_u16(),
                body,
            });
        }

        let check: AuthCheckResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("authCheck response: {e}"),
                body: body.clone(),
            })?;
        Ok(check.user_id)
    }

    fn basic_auth_username(&self) -> String {
        format!("{}.2074.0.0.com.simplisafe.mobile", self.client_id)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TokenState> {
        self.state.read().expect("token state poisoned")
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("base_url", &self.transport.base_url.as_str())
            .field("user_id", &self.user_id())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

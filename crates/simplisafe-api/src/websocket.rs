//! Realtime push channel with auto-reconnect.
//!
//! Connects to the SimpliSafe Socket.IO endpoint (Engine.IO v3 over a
//! plain WebSocket), joins the per-user namespace, and streams lifecycle
//! and event signals through a [`tokio::sync::broadcast`] channel.
//! Reconnection uses exponential backoff + jitter; a refresh-token rotation
//! forces a reconnect so the socket always authenticates with the current
//! access token.
//!
//! # Example
//!
//! ```rust,ignore
//! use simplisafe_api::websocket::{ReconnectConfig, SocketSignal, WebSocketHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = WebSocketHandle::connect(ws_url, tokens, ReconnectConfig::default(), cancel)?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(signal) = rx.recv().await {
//!     if let SocketSignal::Event(payload) = signal {
//!         println!("{payload}");
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::{TokenManager, TokenRefreshed};
use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const SIGNAL_CHANNEL_CAPACITY: usize = 1024;

/// Heartbeat defaults until the server's open packet says otherwise.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// The Socket.IO event name the backend pushes alarm events under.
const EVENT_NAME: &str = "event";

// ── SocketSignal ─────────────────────────────────────────────────────

/// Lifecycle and data signals from the realtime socket.
#[derive(Debug, Clone)]
pub enum SocketSignal {
    /// A connection attempt is starting (`attempt` is 0 for the first try
    /// after a successful session).
    Connecting { attempt: u32 },
    /// The namespace join was acknowledged.
    Connected,
    /// The socket went away.
    Disconnected {
        /// Whether the namespace had been joined before the drop.
        was_connected: bool,
        reason: String,
        /// `false` when the loop has given up (auth failure, retry limit,
        /// shutdown).
        will_retry: bool,
    },
    /// A raw event payload pushed by the backend.
    Event(Arc<Value>),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for socket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running realtime socket.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct WebSocketHandle {
    signal_rx: broadcast::Receiver<SocketSignal>,
    cancel: CancellationToken,
}

impl WebSocketHandle {
    /// Spawn the connect/reconnect loop against `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. The user namespace and access token are taken from
    /// `tokens` at every (re)connect.
    pub fn connect(
        ws_url: Url,
        tokens: Arc<TokenManager>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme for realtime URL: {}",
                ws_url.scheme()
            )));
        }

        let (signal_tx, signal_rx) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, tokens, signal_tx, reconnect, task_cancel).await;
        });

        Ok(Self { signal_rx, cancel })
    }

    /// Get a new broadcast receiver for socket signals.
    pub fn subscribe(&self) -> broadcast::Receiver<SocketSignal> {
        self.signal_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Why a single session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed the socket or left the namespace.
    Closed,
    /// Nothing arrived within `pingInterval + pingTimeout`.
    LinkDead,
    /// The refresh token rotated; reconnect with the new access token.
    TokenRotated,
    Cancelled,
}

/// Main loop: connect → read → on drop, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    tokens: Arc<TokenManager>,
    signal_tx: broadcast::Sender<SocketSignal>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut refreshed_rx = tokens.subscribe();
    let mut attempt: u32 = 0;

    loop {
        let _ = signal_tx.send(SocketSignal::Connecting { attempt });
        let mut connected = false;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Ok(SessionEnd::Cancelled),
            result = connect_and_read(
                &ws_url,
                &tokens,
                &signal_tx,
                &cancel,
                &mut refreshed_rx,
                &mut connected,
            ) => result,
        };

        if connected {
            attempt = 0;
        }

        match result {
            Ok(SessionEnd::Cancelled) => {
                let _ = signal_tx.send(SocketSignal::Disconnected {
                    was_connected: connected,
                    reason: "shutdown requested".into(),
                    will_retry: false,
                });
                break;
            }
            Ok(SessionEnd::TokenRotated) => {
                tracing::info!("access token rotated, reconnecting realtime socket");
                let _ = signal_tx.send(SocketSignal::Disconnected {
                    was_connected: connected,
                    reason: "access token rotated".into(),
                    will_retry: true,
                });
                // Fresh credentials: no backoff.
                continue;
            }
            Ok(end) => {
                tracing::info!(?end, "realtime socket dropped, reconnecting");
                let _ = signal_tx.send(SocketSignal::Disconnected {
                    was_connected: connected,
                    reason: format!("{end:?}"),
                    will_retry: true,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "realtime socket error");
                let fatal = !should_reconnect(&e);
                let exhausted = reconnect.max_retries.is_some_and(|max| attempt >= max);
                if exhausted {
                    tracing::error!(
                        max_retries = reconnect.max_retries,
                        "realtime reconnection limit reached, giving up"
                    );
                }
                let _ = signal_tx.send(SocketSignal::Disconnected {
                    was_connected: connected,
                    reason: e.to_string(),
                    will_retry: !(fatal || exhausted),
                });
                if fatal || exhausted {
                    break;
                }
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = signal_tx.send(SocketSignal::Disconnected {
                    was_connected: false,
                    reason: "shutdown requested".into(),
                    will_retry: false,
                });
                break;
            }
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("realtime loop exiting");
}

/// A lost session is retried only for network-level failures; a dead
/// login or a malformed backend answer will not fix itself.
fn should_reconnect(err: &Error) -> bool {
    !err.requires_login() && err.is_transient()
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Build the socket URL for one connection attempt.
///
/// `{base}?ns=/v1/user/{uid}&accessToken={token}&EIO=3&transport=websocket`
pub fn socket_url(base: &Url, user_id: u64, access_token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("ns", &namespace(user_id))
        .append_pair("accessToken", access_token)
        .append_pair("EIO", "3")
        .append_pair("transport", "websocket");
    url
}

fn namespace(user_id: u64) -> String {
    format!("/v1/user/{user_id}")
}

/// Establish one socket session and read frames until it drops.
async fn connect_and_read(
    base: &Url,
    tokens: &Arc<TokenManager>,
    signal_tx: &broadcast::Sender<SocketSignal>,
    cancel: &CancellationToken,
    refreshed_rx: &mut broadcast::Receiver<TokenRefreshed>,
    connected: &mut bool,
) -> Result<SessionEnd, Error> {
    let access = tokens.access_token().await?;
    let user_id = tokens.user_id().ok_or(Error::NotAuthenticated)?;
    let namespace = namespace(user_id);

    // Drop rotations that happened before this attempt; the token above is current.
    loop {
        match refreshed_rx.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }

    // The query string carries the access token; never log it.
    tracing::info!(host = base.host_str().unwrap_or(""), %namespace, "connecting realtime socket");

    let url = socket_url(base, user_id, access.secret.expose_secret());
    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::debug!("realtime transport open, awaiting handshake");

    let (mut write, mut read) = ws_stream.split();

    let mut ping_interval = DEFAULT_PING_INTERVAL;
    let mut ping_timeout = DEFAULT_PING_TIMEOUT;
    let mut opened = false;
    let mut last_seen = Instant::now();
    let mut heartbeat = tokio::time::interval(ping_interval);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Cancelled);
            }
            rotated = refreshed_rx.recv() => {
                match rotated {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::TokenRotated);
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(SessionEnd::Closed),
                }
            }
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > ping_interval + ping_timeout {
                    tracing::warn!(
                        silent_ms = u64::try_from(last_seen.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "realtime heartbeat timed out"
                    );
                    return Ok(SessionEnd::LinkDead);
                }
                if opened {
                    tracing::trace!("sending heartbeat");
                    send_text(&mut write, "2").await?;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match Packet::parse(text.as_str()) {
                            Packet::Open(open) => {
                                ping_interval = open.ping_interval();
                                ping_timeout = open.ping_timeout();
                                tracing::debug!(
                                    sid = %open.sid,
                                    ping_interval_ms = open.ping_interval,
                                    ping_timeout_ms = open.ping_timeout,
                                    "handshake received"
                                );
                                heartbeat = tokio::time::interval_at(
                                    Instant::now() + ping_interval,
                                    ping_interval,
                                );
                                opened = true;
                                send_text(&mut write, &format!("40{namespace}")).await?;
                            }
                            Packet::Ping => send_text(&mut write, "3").await?,
                            Packet::Pong => tracing::trace!("heartbeat acknowledged"),
                            Packet::Close => return Ok(SessionEnd::Closed),
                            Packet::Message(SocketPacket::Connect { namespace: ns }) => {
                                if ns == namespace {
                                    tracing::info!(%namespace, "realtime socket connected");
                                    *connected = true;
                                    let _ = signal_tx.send(SocketSignal::Connected);
                                } else {
                                    tracing::trace!(%ns, "ignoring connect for other namespace");
                                }
                            }
                            Packet::Message(SocketPacket::Disconnect { namespace: ns }) => {
                                tracing::info!(%ns, "server left namespace");
                                return Ok(SessionEnd::Closed);
                            }
                            Packet::Message(SocketPacket::Event { name, payload, .. }) => {
                                if name == EVENT_NAME {
                                    let _ = signal_tx.send(SocketSignal::Event(Arc::new(payload)));
                                } else {
                                    tracing::debug!(%name, "ignoring unrecognized socket event");
                                }
                            }
                            Packet::Message(SocketPacket::Error { message, .. }) => {
                                return Err(Error::WebSocketConnect(format!(
                                    "namespace rejected: {message}"
                                )));
                            }
                            Packet::Message(SocketPacket::Other(raw)) | Packet::Other(raw) => {
                                tracing::trace!(%raw, "ignoring socket frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        last_seen = Instant::now();
                    }
                    Some(Ok(Message::Close(Some(frame)))) => {
                        tracing::info!(code = %frame.code, reason = %frame.reason, "close frame received");
                        return Err(Error::WebSocketClosed {
                            code: frame.code.into(),
                            reason: frame.reason.as_str().to_owned(),
                        });
                    }
                    Some(Ok(Message::Close(None))) => return Ok(SessionEnd::Closed),
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("realtime stream ended");
                        return Ok(SessionEnd::Closed);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

async fn send_text<S>(write: &mut S, text: &str) -> Result<(), Error>
where
    S: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    write
        .send(Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Engine.IO handshake payload (`0{...}`). Intervals are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPacket {
    pub sid: String,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout: u64,
}

impl OpenPacket {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}

fn default_ping_interval_ms() -> u64 {
    25_000
}

fn default_ping_timeout_ms() -> u64 {
    60_000
}

/// An Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenPacket),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Other(String),
}

/// A Socket.IO packet carried inside an Engine.IO message (`4...`).
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
    Error { namespace: String, message: String },
    Other(String),
}

impl Packet {
    /// Parse one text frame.
    pub fn parse(text: &str) -> Self {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Self::Other(String::new());
        };
        let rest = chars.as_str();

        match kind {
            '0' => match serde_json::from_str::<OpenPacket>(rest) {
                Ok(open) => Self::Open(open),
                Err(_) => Self::Other(text.to_owned()),
            },
            '1' => Self::Close,
            '2' => Self::Ping,
            '3' => Self::Pong,
            '4' => Self::Message(SocketPacket::parse(rest)),
            _ => Self::Other(text.to_owned()),
        }
    }
}

impl SocketPacket {
    fn parse(text: &str) -> Self {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Self::Other(String::new());
        };
        let (namespace, body) = split_namespace(chars.as_str());

        match kind {
            '0' => Self::Connect { namespace },
            '1' => Self::Disconnect { namespace },
            '2' => {
                // Optional ack id precedes the JSON array.
                let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
                match serde_json::from_str::<Value>(body) {
                    Ok(Value::Array(mut items)) if !items.is_empty() => {
                        let name = items
                            .first()
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned();
                        let payload = if items.len() > 1 {
                            items.swap_remove(1)
                        } else {
                            Value::Null
                        };
                        Self::Event {
                            namespace,
                            name,
                            payload,
                        }
                    }
                    _ => Self::Other(text.to_owned()),
                }
            }
            '4' => {
                let message = match serde_json::from_str::<Value>(body) {
                    Ok(Value::String(s)) => s,
                    Ok(other) => other.to_string(),
                    Err(_) => body.to_owned(),
                };
                Self::Error { namespace, message }
            }
            _ => Self::Other(text.to_owned()),
        }
    }
}

/// Split a leading `/namespace,` off a Socket.IO packet body.
fn split_namespace(text: &str) -> (String, &str) {
    if !text.starts_with('/') {
        return ("/".to_owned(), text);
    }
    match text.find(',') {
        Some(idx) => (text[..idx].to_owned(), &text[idx + 1..]),
        None => (text.to_owned(), ""),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::cast_precision_loss, clippy::as_conversions, clippy::cast_possible_wrap)]
pub fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

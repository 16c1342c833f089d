// ── Realtime channel ──
//
// Wraps the socket loop from simplisafe-api with a connection state
// machine and one callback slot per {connect, disconnect, event}.
// Callbacks run on a dedicated dispatch task fed by the socket's broadcast
// queue; the socket read loop never waits on user code.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use strum::{AsRefStr, Display};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use simplisafe_api::TokenManager;
use simplisafe_api::websocket::{ReconnectConfig, SocketSignal, WebSocketHandle};

use crate::error::CoreError;
use crate::events::{self, Event};

/// Where the realtime connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Dropped unexpectedly; backing off before the next attempt.
    Reconnecting,
}

type ConnectHandler = Arc<dyn Fn() + Send + Sync>;
type DisconnectHandler = Arc<dyn Fn(&str) + Send + Sync>;
type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    connect: Option<ConnectHandler>,
    disconnect: Option<DisconnectHandler>,
    event: Option<EventHandler>,
}

struct Session {
    handle: WebSocketHandle,
    dispatcher: JoinHandle<()>,
}

/// Push-event connection for one logged-in user.
pub struct RealtimeChannel {
    tokens: Arc<TokenManager>,
    url: Url,
    reconnect: ReconnectConfig,
    handlers: Arc<Mutex<Handlers>>,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Bumped per `connect()`; a dispatcher only drives the state while
    /// its session is the current one.
    session_id: Arc<AtomicU64>,
    session: Mutex<Option<Session>>,
    /// Frames the dispatcher skipped because it fell behind the socket.
    dropped: Arc<AtomicU64>,
}

impl RealtimeChannel {
    pub(crate) fn new(tokens: Arc<TokenManager>, url: Url, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            tokens,
            url,
            reconnect,
            handlers: Arc::new(Mutex::new(Handlers::default())),
            state: Arc::new(state),
            session_id: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(None),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Push frames lost so far because callbacks could not keep up with
    /// the socket. Counts across reconnects.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    // ── Handlers ─────────────────────────────────────────────────────

    /// Called each time the user namespace is joined. Replaces any
    /// previously registered connect handler.
    pub fn on_connect(&self, handler: impl Fn() + Send + Sync + 'static) {
        self.handlers.lock().expect("handler lock poisoned").connect = Some(Arc::new(handler));
    }

    /// Called with a reason each time an established connection ends.
    pub fn on_disconnect(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.handlers.lock().expect("handler lock poisoned").disconnect =
            Some(Arc::new(handler));
    }

    /// Called with every normalized push event.
    pub fn on_event(&self, handler: impl Fn(&Event) + Send + Sync + 'static) {
        self.handlers.lock().expect("handler lock poisoned").event = Some(Arc::new(handler));
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start connecting. Returns once the background task is running; watch
    /// [`state`](Self::state) or the connect handler for the namespace ack.
    ///
    /// A no-op while a session is already active.
    pub fn connect(&self) -> Result<(), CoreError> {
        let mut session = self.session.lock().expect("session lock poisoned");
        if session.as_ref().is_some_and(|s| !s.dispatcher.is_finished()) {
            debug!("realtime channel already running");
            return Ok(());
        }

        let id = self.session_id.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = WebSocketHandle::connect(
            self.url.clone(),
            Arc::clone(&self.tokens),
            self.reconnect.clone(),
            CancellationToken::new(),
        )?;
        self.state.send_replace(ConnectionState::Connecting);

        let dispatcher = tokio::spawn(dispatch(
            handle.subscribe(),
            Arc::clone(&self.handlers),
            Arc::clone(&self.state),
            Arc::clone(&self.session_id),
            id,
            Arc::clone(&self.dropped),
        ));

        *session = Some(Session { handle, dispatcher });
        Ok(())
    }

    /// Close the connection and stop reconnecting. Resolves after the
    /// disconnect handler (if the link was up) has run.
    pub async fn disconnect(&self) {
        let session = self.session.lock().expect("session lock poisoned").take();
        let Some(session) = session else {
            return;
        };

        info!("disconnecting realtime channel");
        session.handle.shutdown();
        if let Err(e) = session.dispatcher.await {
            warn!(error = %e, "realtime dispatcher ended abnormally");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Ok(Some(session)) = self.session.get_mut().map(Option::take) {
            session.handle.shutdown();
        }
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("url", &self.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Dispatch task ────────────────────────────────────────────────────

async fn dispatch(
    mut rx: broadcast::Receiver<SocketSignal>,
    handlers: Arc<Mutex<Handlers>>,
    state: Arc<watch::Sender<ConnectionState>>,
    current: Arc<AtomicU64>,
    id: u64,
    dropped: Arc<AtomicU64>,
) {
    let set_state = |next: ConnectionState| {
        if current.load(Ordering::SeqCst) == id {
            state.send_replace(next);
        }
    };

    loop {
        let signal = match rx.recv().await {
            Ok(signal) => signal,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                let total = dropped.fetch_add(skipped, Ordering::Relaxed) + skipped;
                warn!(skipped, total, "realtime dispatcher lagging, frames dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match signal {
            SocketSignal::Connecting { attempt } => {
                debug!(attempt, "realtime connecting");
                if *state.borrow() != ConnectionState::Reconnecting {
                    set_state(ConnectionState::Connecting);
                }
            }
            SocketSignal::Connected => {
                set_state(ConnectionState::Connected);
                let handler = handlers.lock().expect("handler lock poisoned").connect.clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
            SocketSignal::Disconnected {
                was_connected,
                reason,
                will_retry,
            } => {
                set_state(if will_retry {
                    ConnectionState::Reconnecting
                } else {
                    ConnectionState::Disconnected
                });
                if was_connected {
                    let handler = handlers
                        .lock()
                        .expect("handler lock poisoned")
                        .disconnect
                        .clone();
                    if let Some(handler) = handler {
                        handler(&reason);
                    }
                }
                if !will_retry {
                    break;
                }
            }
            SocketSignal::Event(payload) => {
                let normalized = events::normalize(&payload);
                let handler = handlers.lock().expect("handler lock poisoned").event.clone();
                if let Some(handler) = handler {
                    handler(&normalized.event);
                }
            }
        }
    }

    debug!("realtime dispatcher exiting");
}

//! Push-channel client with fixed-delay reconnect.
//!
//! [`ConnectionManager`] owns the one WebSocket to the backend. A background
//! task opens it, dispatches inbound frames to the [`StatusStore`] and
//! [`NotificationController`], answers application pings, and reopens the
//! channel after it drops. Other components only ever see the channel through
//! the read-only [`ConnectionStatus`] watch.
//!
//! ## State machine
//!
//! ```text
//!            handshake ok
//! Connecting ───────────▶ Open
//!     │  ▲                 │
//!     │  │ retry / manual  │ close, error
//!     ▼  │                 ▼
//!    Closed ◀──────────────┘
//! ```
//!
//! Any other transition is refused. `Closed → Connecting` happens after the
//! reconnect delay (3 s by default) or straight away on [`ConnectionManager::reconnect`].
//! The delay and the manual request are served by the same task loop, so a
//! timer never opens a second channel next to a newer one.
//!
//! A handshake that does not complete within `handshake_timeout` counts as a
//! failed attempt and goes through the same `Closed` and retry path. A manual
//! reconnect during a handshake abandons it and starts a fresh attempt.
//!
//! ## Status request
//!
//! Once open, the task waits `status_request_delay` before sending `status`
//! so the backend sees the request only after its side of the channel is
//! ready. Inbound frames are handled during that wait.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::notify::NotificationController;
use crate::protocol::{self, InboundEvent, PONG, STATUS_REQUEST};
use crate::status::StatusStore;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle state of the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::{Closed, Connecting, Open};
        matches!(
            (self, next),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closed) | (Closed, Connecting)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "connected",
            ConnectionState::Closed => "disconnected",
        };
        f.write_str(s)
    }
}

/// Read-only view of the push channel, published by the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Most recent connection failure, as the `Display` of a
    /// [`ClientError::Transport`]. Cleared when a channel opens.
    pub last_error: Option<String>,
    /// Connection attempts made since start, failed ones included.
    pub attempts: u64,
    /// Times a channel opened again after an earlier one had closed.
    pub reconnects: u64,
}

impl ConnectionStatus {
    fn initial() -> Self {
        Self {
            state: ConnectionState::Connecting,
            last_error: None,
            attempts: 0,
            reconnects: 0,
        }
    }
}

/// Routes decoded push frames to the components that consume them.
#[derive(Clone)]
pub struct PushDispatcher {
    store: StatusStore,
    notifications: NotificationController,
}

impl PushDispatcher {
    pub fn new(store: StatusStore, notifications: NotificationController) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Handle one inbound text frame. Returns the text to send back, if any.
    ///
    /// Malformed frames are logged and dropped without touching any state.
    pub fn dispatch(&self, text: &str) -> Option<&'static str> {
        match protocol::parse_inbound(text) {
            Ok(Some(InboundEvent::StatusUpdate(status))) => {
                self.store.apply_push(status);
                None
            }
            Ok(Some(InboundEvent::NoMoreTargets(status, message))) => {
                self.notifications.on_no_more_targets(status, message);
                None
            }
            Ok(Some(InboundEvent::Ping)) => Some(PONG),
            Ok(None) => {
                debug!("ignoring push frame of unknown type: {text}");
                None
            }
            Err(e) => {
                warn!("dropping push frame: {e}");
                None
            }
        }
    }
}

enum Control {
    Reconnect,
    Shutdown,
}

/// How a connected session ended.
enum SessionEnd {
    /// Remote close, stream end, or a transport failure.
    Dropped(Option<ClientError>),
    Reconnect,
    Shutdown,
}

impl SessionEnd {
    fn transport(err: &impl fmt::Display) -> Self {
        SessionEnd::Dropped(Some(ClientError::Transport(err.to_string())))
    }
}

/// Handle to the push-channel task.
pub struct ConnectionManager {
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<ConnectionStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Start connecting to `url` in a background task.
    ///
    /// Returns immediately in the `Connecting` state; failures are retried
    /// for as long as the manager lives. Must be called inside a tokio
    /// runtime.
    pub fn connect(url: String, config: ConnectionConfig, dispatcher: PushDispatcher) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::initial());

        let task = ConnectionTask {
            url,
            config,
            dispatcher,
            status: status_tx,
            control: control_rx,
        };
        let handle = tokio::spawn(task.run());

        Self {
            control: control_tx,
            status: status_rx,
            task: Mutex::new(Some(handle)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Drop the current channel or pending handshake (if any) and open a new
    /// one now, skipping any pending reconnect delay.
    pub fn reconnect(&self) {
        if self.control.send(Control::Reconnect).is_err() {
            debug!("reconnect requested after shutdown");
        }
    }

    /// Close the channel, cancel pending timers, and wait for the task to end.
    pub async fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("push channel task ended abnormally: {e}");
            }
        }
    }
}

struct ConnectionTask {
    url: String,
    config: ConnectionConfig,
    dispatcher: PushDispatcher,
    status: watch::Sender<ConnectionStatus>,
    control: mpsc::UnboundedReceiver<Control>,
}

impl ConnectionTask {
    /// Main loop: connect, run the session, wait, reconnect. Never gives up.
    async fn run(mut self) {
        let mut opened_before = false;
        loop {
            let end = match self.open().await {
                Some(Ok(ws)) => {
                    self.status.send_modify(|s| {
                        s.last_error = None;
                        if opened_before {
                            s.reconnects += 1;
                        }
                    });
                    opened_before = true;
                    self.transition(ConnectionState::Open);
                    info!("push channel connected to {}", self.url);
                    self.run_session(ws).await
                }
                Some(Err(e)) => {
                    warn!("push channel connect to {} failed: {e}", self.url);
                    SessionEnd::Dropped(Some(e))
                }
                None => SessionEnd::Shutdown,
            };

            // Record the reason first so observers of `Closed` see it.
            if let SessionEnd::Dropped(Some(err)) = &end {
                let reason = err.to_string();
                self.status.send_modify(|s| s.last_error = Some(reason));
            }
            self.transition(ConnectionState::Closed);

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Reconnect => info!("push channel reconnect requested"),
                SessionEnd::Dropped(_) => {
                    let delay = self.config.reconnect_delay();
                    info!("push channel closed, reconnecting in {}ms", delay.as_millis());
                    if !self.wait_for_retry(delay).await {
                        break;
                    }
                }
            }

            self.transition(ConnectionState::Connecting);
        }

        debug!("push channel task stopped");
    }

    /// Connect with a bounded handshake. `None` means shutdown was requested
    /// meanwhile. A manual reconnect drops the pending handshake and retries.
    async fn open(&mut self) -> Option<Result<WsStream, ClientError>> {
        let limit = self.config.handshake_timeout();
        loop {
            self.status.send_modify(|s| s.attempts += 1);
            let connect =
                tokio::time::timeout(limit, tokio_tungstenite::connect_async(self.url.as_str()));

            tokio::select! {
                res = connect => {
                    return Some(match res {
                        Ok(Ok((ws, _))) => Ok(ws),
                        Ok(Err(e)) => Err(ClientError::Transport(format!(
                            "failed to connect to backend: {e}"
                        ))),
                        Err(_) => Err(ClientError::Transport(format!(
                            "handshake timed out after {}ms",
                            limit.as_millis()
                        ))),
                    });
                }
                cmd = self.control.recv() => match cmd {
                    Some(Control::Reconnect) => debug!("abandoning pending handshake"),
                    Some(Control::Shutdown) | None => return None,
                },
            }
        }
    }

    /// Sleep out the reconnect delay. Returns `false` on shutdown; a manual
    /// reconnect ends the wait early.
    async fn wait_for_retry(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        tokio::select! {
            () = &mut sleep => true,
            cmd = self.control.recv() => matches!(cmd, Some(Control::Reconnect)),
        }
    }

    async fn run_session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let settle = tokio::time::sleep(self.config.status_request_delay());
        tokio::pin!(settle);
        let mut status_requested = false;

        loop {
            tokio::select! {
                () = &mut settle, if !status_requested => {
                    status_requested = true;
                    if let Err(e) = sink.send(Message::Text(STATUS_REQUEST.into())).await {
                        return SessionEnd::transport(&e);
                    }
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = self.dispatcher.dispatch(&text) {
                            if let Err(e) = sink.send(Message::Text(reply.into())).await {
                                return SessionEnd::transport(&e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("push channel closed by backend: {frame:?}");
                        return SessionEnd::Dropped(None);
                    }
                    Some(Ok(_)) => {} // tungstenite answers protocol pings itself
                    Some(Err(e)) => {
                        warn!("push channel error: {e}");
                        return SessionEnd::transport(&e);
                    }
                    None => return SessionEnd::Dropped(None),
                },
                cmd = self.control.recv() => {
                    let end = match cmd {
                        Some(Control::Reconnect) => SessionEnd::Reconnect,
                        Some(Control::Shutdown) | None => SessionEnd::Shutdown,
                    };
                    if let Err(e) = sink.close().await {
                        debug!("close frame not delivered: {e}");
                    }
                    return end;
                }
            }
        }
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let mut applied = false;
        self.status.send_if_modified(|s| {
            if s.state.can_transition_to(next) {
                debug!("push channel {:?} -> {:?}", s.state, next);
                s.state = next;
                applied = true;
            } else {
                warn!("refusing push channel transition {:?} -> {:?}", s.state, next);
            }
            applied
        });
        applied
    }
}

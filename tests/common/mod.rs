//! In-process push-channel backend for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use autofollow_ctl::config::ConnectionConfig;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

#[derive(Clone, Debug)]
enum ServerCmd {
    Send(String),
    Close,
}

#[derive(Default)]
struct ServerState {
    active: AtomicUsize,
    max_active: AtomicUsize,
    accepted: AtomicUsize,
    received: Mutex<Vec<(Instant, String)>>,
    opened_at: Mutex<Vec<Instant>>,
    closed_at: Mutex<Vec<Instant>>,
}

impl ServerState {
    fn opened(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.accepted.fetch_add(1, Ordering::SeqCst);
        self.opened_at.lock().unwrap().push(Instant::now());
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.closed_at.lock().unwrap().push(Instant::now());
    }
}

/// WebSocket server standing in for the backend's `/ws` endpoint.
pub struct MockPushServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    cmds: broadcast::Sender<ServerCmd>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl MockPushServer {
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_on(addr: SocketAddr) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());
        let (cmds, _) = broadcast::channel(64);

        let accept_state = Arc::clone(&state);
        let accept_cmds = cmds.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let rx = accept_cmds.subscribe();
                tokio::spawn(serve_connection(tcp, Arc::clone(&accept_state), rx));
            }
        });

        Self {
            addr,
            state,
            cmds,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a text frame to every open connection.
    pub fn push(&self, frame: &str) {
        let _ = self.cmds.send(ServerCmd::Send(frame.to_string()));
    }

    /// Close every open connection from the server side.
    pub fn close_all(&self) {
        let _ = self.cmds.send(ServerCmd::Close);
    }

    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    pub fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// When the first frame with this exact text arrived.
    pub fn received_at(&self, text: &str) -> Option<Instant> {
        self.state
            .received
            .lock()
            .unwrap()
            .iter()
            .find(|(_, m)| m == text)
            .map(|(t, _)| *t)
    }

    pub fn opened_at(&self) -> Vec<Instant> {
        self.state.opened_at.lock().unwrap().clone()
    }

    pub fn closed_at(&self) -> Vec<Instant> {
        self.state.closed_at.lock().unwrap().clone()
    }
}

impl Drop for MockPushServer {
    fn drop(&mut self) {
        self.accept_task.abort();
        let _ = self.cmds.send(ServerCmd::Close);
    }
}

async fn serve_connection(
    tcp: tokio::net::TcpStream,
    state: Arc<ServerState>,
    mut cmds: broadcast::Receiver<ServerCmd>,
) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
        return;
    };
    state.opened();

    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    state.received.lock().unwrap().push((Instant::now(), text));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    state.closed();
                    return;
                }
                Some(Ok(_)) => {}
            },
            cmd = cmds.recv() => match cmd {
                Ok(ServerCmd::Send(text)) => {
                    if ws.send(Message::Text(text)).await.is_err() {
                        state.closed();
                        return;
                    }
                }
                Ok(ServerCmd::Close) | Err(broadcast::error::RecvError::Closed) => {
                    // Count the channel as gone before the client can react.
                    state.closed();
                    let _ = ws.close(None).await;
                    return;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
}

/// Accepts TCP connections and never answers the WebSocket upgrade.
pub struct SilentListener {
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl SilentListener {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let accept_task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((tcp, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(tcp);
            }
        });

        Self {
            addr,
            accepted,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for SilentListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Connection timings suitable for tests: quick settle, configurable retry.
pub fn fast_config(reconnect_delay_ms: u64) -> ConnectionConfig {
    ConnectionConfig {
        reconnect_delay_ms,
        status_request_delay_ms: 50,
        ..ConnectionConfig::default()
    }
}

/// Poll `check` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Await `fut`, failing the test if it takes longer than `secs`.
pub async fn within<T>(secs: u64, fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(secs), fut)
        .await
        .expect("timed out")
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::SessionConfig;
use crate::protocol::{decode_command, encode_event, DebugCommand, DebugEvent};
use crate::shutdown::ShutdownSignal;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub type CommandCallback = Arc<dyn Fn(DebugCommand) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// No live socket; events are accepted and discarded.
    Sink,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub sent: u64,
    pub discarded: u64,
}

/// Client end of the debug connection, owned by the instrumented application.
///
/// `send` never blocks and never fails: events go into an unbounded queue that a
/// background task drains onto the socket in submission order.
#[derive(Clone)]
pub struct DebugSession {
    shared: Arc<SessionShared>,
    outbound: mpsc::UnboundedSender<DebugEvent>,
}

struct SessionShared {
    status: watch::Sender<ConnectionStatus>,
    shutdown: ShutdownSignal,
    on_command: RwLock<Option<CommandCallback>>,
    sent: AtomicU64,
    discarded: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionShared {
    fn new(status: ConnectionStatus) -> Self {
        let (status, _) = watch::channel(status);
        Self {
            status,
            shutdown: ShutdownSignal::new(),
            on_command: RwLock::new(None),
            sent: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            // Closed is terminal.
            if *current == status || *current == ConnectionStatus::Closed {
                return false;
            }
            *current = status;
            true
        });
    }

    fn discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn deliver(&self, command: DebugCommand) {
        let callback = self.on_command.read().clone();
        match callback {
            Some(callback) => callback(command),
            None => tracing::debug!(target_name = %command.target, "command received without handler"),
        }
    }
}

enum LinkEnd {
    Shutdown,
    Dropped,
}

impl DebugSession {
    /// Starts connecting in the background and returns immediately.
    ///
    /// Outside a tokio runtime the session starts in sink mode.
    pub fn connect(config: SessionConfig) -> Self {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared::new(ConnectionStatus::Connecting));

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(run_session(config, shared.clone(), receiver));
                *shared.task.lock() = Some(task);
            }
            Err(_) => {
                tracing::warn!("no tokio runtime available, debug session runs in sink mode");
                shared.set_status(ConnectionStatus::Sink);
            }
        }

        Self { shared, outbound }
    }

    /// A session that never connects; every event is discarded.
    pub fn sink() -> Self {
        let (outbound, _) = mpsc::unbounded_channel();
        let shared = Arc::new(SessionShared::new(ConnectionStatus::Sink));
        Self { shared, outbound }
    }

    pub fn send(&self, event: DebugEvent) {
        match self.status() {
            ConnectionStatus::Sink | ConnectionStatus::Closed => self.shared.discard(),
            ConnectionStatus::Connecting | ConnectionStatus::Connected => {
                if self.outbound.send(event).is_err() {
                    self.shared.discard();
                }
            }
        }
    }

    /// Installs the handler for inbound commands, replacing any previous one.
    pub fn on_command<F>(&self, callback: F)
    where
        F: Fn(DebugCommand) + Send + Sync + 'static,
    {
        *self.shared.on_command.write() = Some(Arc::new(callback));
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            sent: self.shared.sent.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
        }
    }

    /// Closes the socket and stops both loops. Queued events are dropped.
    pub fn disconnect(&self) {
        if !self.shared.shutdown.signal() {
            return;
        }
        tracing::debug!("debug session disconnecting");
        if self.shared.task.lock().is_none() {
            self.shared.set_status(ConnectionStatus::Closed);
        }
    }

    /// Waits until the background task has finished after `disconnect`.
    pub async fn closed(&self) {
        let task = self.shared.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.shared.set_status(ConnectionStatus::Closed);
    }
}

async fn run_session(
    config: SessionConfig,
    shared: Arc<SessionShared>,
    mut outbound: mpsc::UnboundedReceiver<DebugEvent>,
) {
    let url = config.url();
    let mut failures: u32 = 0;

    loop {
        if shared.shutdown.is_shutting_down() {
            break;
        }

        shared.set_status(ConnectionStatus::Connecting);
        let attempt = tokio::select! {
            attempt = connect_async(url.as_str()) => attempt,
            _ = shared.shutdown.wait() => break,
        };
        match attempt {
            Ok((ws, _)) => {
                failures = 0;
                shared.set_status(ConnectionStatus::Connected);
                tracing::info!(url = %url, "debug session connected");

                match pump(ws, &mut outbound, &shared).await {
                    LinkEnd::Shutdown => break,
                    LinkEnd::Dropped => tracing::warn!(url = %url, "debug connection dropped"),
                }
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "debug session failed to connect");
            }
        }

        shared.set_status(ConnectionStatus::Sink);
        failures += 1;
        if failures > config.reconnect_attempts {
            tracing::warn!(
                attempts = config.reconnect_attempts,
                "debug session giving up, events will be discarded"
            );
            discard_until_shutdown(&mut outbound, &shared, None).await;
            break;
        }

        let backoff = Duration::from_millis(config.reconnect_backoff_ms * u64::from(failures));
        if !discard_until_shutdown(&mut outbound, &shared, Some(backoff)).await {
            break;
        }
    }

    outbound.close();
    shared.set_status(ConnectionStatus::Closed);
    tracing::debug!("debug session closed");
}

/// Drops queued events while disconnected. Returns `false` on shutdown.
async fn discard_until_shutdown(
    outbound: &mut mpsc::UnboundedReceiver<DebugEvent>,
    shared: &SessionShared,
    limit: Option<Duration>,
) -> bool {
    let stopped = shared.shutdown.wait();
    tokio::pin!(stopped);
    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => return true,
            _ = &mut stopped => return false,
            event = outbound.recv() => match event {
                Some(_) => shared.discard(),
                None => return false,
            },
        }
    }
}

/// Runs one connection: this task drains the queue, a second one reads.
async fn pump(
    ws: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<DebugEvent>,
    shared: &Arc<SessionShared>,
) -> LinkEnd {
    let (mut ws_tx, ws_rx) = ws.split();
    let mut reader = tokio::spawn(read_loop(ws_rx, shared.clone()));
    let stopped = shared.shutdown.wait();
    tokio::pin!(stopped);

    let end = loop {
        tokio::select! {
            _ = &mut stopped => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break LinkEnd::Shutdown;
            }
            _ = &mut reader => break LinkEnd::Dropped,
            event = outbound.recv() => {
                let Some(event) = event else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break LinkEnd::Shutdown;
                };
                let frame = match encode_event(&event) {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::error!(error = %err, "dropping unencodable event");
                        shared.discard();
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                    shared.discard();
                    break LinkEnd::Dropped;
                }
                shared.sent.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    reader.abort();
    end
}

async fn read_loop(
    mut ws_rx: futures::stream::SplitStream<WsStream>,
    shared: Arc<SessionShared>,
) {
    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(ref t) => t.as_str().to_string(),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    tracing::warn!(len = data.len(), "dropping non-UTF8 command frame");
                    continue;
                }
            },
            Message::Close(_) => break,
            _ => continue,
        };

        match decode_command(&text) {
            Ok(command) => shared.deliver(command),
            Err(err) => tracing::warn!(error = %err, "dropping malformed command frame"),
        }
    }
}

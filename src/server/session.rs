//! One application socket, from upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::hub::{ClientConnection, ClientHub};
use crate::protocol::decode_event;
use crate::shutdown::ShutdownSignal;
use crate::store::EventStore;

/// Counts live socket sessions so `stop` can wait for the last one to end.
#[derive(Clone)]
pub(crate) struct SessionTracker {
    active: Arc<watch::Sender<usize>>,
}

impl SessionTracker {
    pub(crate) fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self {
            active: Arc::new(active),
        }
    }

    fn enter(&self) -> SessionGuard {
        self.active.send_modify(|n| *n += 1);
        SessionGuard {
            active: self.active.clone(),
        }
    }

    pub(crate) async fn idle(&self) {
        let mut active = self.active.subscribe();
        let _ = active.wait_for(|n| *n == 0).await;
    }
}

struct SessionGuard {
    active: Arc<watch::Sender<usize>>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n -= 1);
    }
}

/// Ingests every decodable frame into `store` and forwards hub commands to the
/// socket until either side closes or the server stops.
pub(crate) async fn run_ws_session(
    ws: WebSocket,
    app: String,
    store: EventStore,
    hub: Arc<ClientHub>,
    shutdown: ShutdownSignal,
    tracker: SessionTracker,
) {
    let _active = tracker.enter();
    let client_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::unbounded_channel::<Arc<str>>();
    hub.add(Arc::new(ClientConnection::new(
        client_id.clone(),
        app.clone(),
        send_tx,
    )));
    info!(client_id, app, "application connected");

    let outbound = tokio::spawn(async move {
        while let Some(frame) = send_rx.recv().await {
            if ws_tx.send(Message::Text(frame.as_ref().into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let stopped = shutdown.wait();
    tokio::pin!(stopped);

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            _ = &mut stopped => {
                debug!(client_id, "server stopping, closing socket");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        let text = match msg {
            Message::Text(ref t) => t.as_str().to_string(),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    warn!(client_id, len = data.len(), "dropping non-UTF8 frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!(client_id, "application sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        // Frames read after stop began are dropped; stop clears once sessions end.
        if shutdown.is_shutting_down() {
            break;
        }
        match decode_event(&text) {
            Ok(event) => {
                store.ingest(event);
            }
            Err(err) => warn!(client_id, error = %err, "dropping malformed event frame"),
        }
    }

    hub.remove(&client_id);
    // The writer exits once the hub entry (and its sender) is gone.
    let _ = outbound.await;
    info!(client_id, "application disconnected");
}

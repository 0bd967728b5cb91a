//! Command fan-out to connected applications.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::protocol::{encode_command, DebugCommand};

/// One connected application socket.
pub struct ClientConnection {
    pub id: String,
    /// Application name taken from the websocket path.
    pub app: String,
    pub connected_at: Instant,
    tx: mpsc::UnboundedSender<Arc<str>>,
}

impl ClientConnection {
    pub fn new(id: String, app: String, tx: mpsc::UnboundedSender<Arc<str>>) -> Self {
        Self {
            id,
            app,
            connected_at: Instant::now(),
            tx,
        }
    }

    /// Queues a frame for the socket writer. `false` once the socket is gone.
    pub fn send(&self, frame: Arc<str>) -> bool {
        self.tx.send(frame).is_ok()
    }
}

#[derive(Default)]
pub struct ClientHub {
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: Arc<ClientConnection>) {
        self.connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    pub fn remove(&self, connection_id: &str) {
        self.connections.write().remove(connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn apps(&self) -> Vec<String> {
        let mut apps: Vec<String> = self
            .connections
            .read()
            .values()
            .map(|conn| conn.app.clone())
            .collect();
        apps.sort();
        apps.dedup();
        apps
    }

    /// Sends `command` to every socket and returns how many accepted it.
    ///
    /// A socket that fails is dropped from the hub; the others still receive it.
    pub fn broadcast(&self, command: &DebugCommand) -> usize {
        let frame: Arc<str> = match encode_command(command) {
            Ok(frame) => frame.into(),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode command");
                return 0;
            }
        };

        let mut recipients = 0;
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read();
            for conn in conns.values() {
                if conn.send(Arc::clone(&frame)) {
                    recipients += 1;
                } else {
                    tracing::debug!(conn_id = %conn.id, "skipping closed client");
                    to_remove.push(conn.id.clone());
                }
            }
        }

        if !to_remove.is_empty() {
            let mut conns = self.connections.write();
            for id in &to_remove {
                conns.remove(id);
            }
        }

        tracing::debug!(
            kind = ?command.kind,
            target_name = %command.target,
            recipients,
            "command broadcast"
        );
        recipients
    }

    /// Drops every connection; their writers see the closed channel and exit.
    pub fn close_all(&self) {
        self.connections.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode_command;

    fn connection(id: &str) -> (Arc<ClientConnection>, mpsc::UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(ClientConnection::new(id.into(), "shop".into(), tx)),
            rx,
        )
    }

    #[test]
    fn broadcast_reaches_every_client() {
        let hub = ClientHub::new();
        let (c1, mut rx1) = connection("c1");
        let (c2, mut rx2) = connection("c2");
        hub.add(c1);
        hub.add(c2);

        let sent = hub.broadcast(&DebugCommand::set_state("Cart", 1));

        assert_eq!(sent, 2);
        let frame = rx1.try_recv().expect("c1 frame");
        assert_eq!(decode_command(&frame).unwrap(), DebugCommand::set_state("Cart", 1));
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn closed_client_does_not_abort_broadcast() {
        let hub = ClientHub::new();
        let (dead, dead_rx) = connection("dead");
        let (live, mut live_rx) = connection("live");
        hub.add(dead);
        hub.add(live);
        drop(dead_rx);

        let sent = hub.broadcast(&DebugCommand::inject_action("Cart", "Checkout"));

        assert_eq!(sent, 1);
        assert!(live_rx.try_recv().is_ok());
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn close_all_empties_hub() {
        let hub = ClientHub::new();
        let (c1, _rx) = connection("c1");
        hub.add(c1);
        hub.close_all();
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.broadcast(&DebugCommand::set_state("Cart", 1)), 0);
    }
}

//! Debug host: accepts application sockets, feeds the event store and sends
//! commands back.

mod hub;
mod session;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::dispatch::resolve_set_state;
use crate::protocol::DebugCommand;
use crate::shutdown::ShutdownSignal;
use crate::store::EventStore;

pub use hub::{ClientConnection, ClientHub};

use session::SessionTracker;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address '{addr}': {source}")]
    InvalidAddress {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Clone)]
struct AppState {
    store: EventStore,
    hub: Arc<ClientHub>,
    shutdown: ShutdownSignal,
    sessions: SessionTracker,
}

pub struct DebugServer {
    addr: SocketAddr,
    listener: TcpListener,
    ws_prefix: String,
    handle: ServerHandle,
}

impl DebugServer {
    /// Binds the listener now so the address is known before `run`.
    pub async fn bind(config: &ServerConfig, store: EventStore) -> Result<Self, ServerError> {
        let requested: SocketAddr =
            config
                .bind_addr
                .parse()
                .map_err(|source| ServerError::InvalidAddress {
                    addr: config.bind_addr.clone(),
                    source,
                })?;
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| ServerError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener.local_addr()?;

        tracing::info!(%addr, "debug host bound");
        Ok(Self {
            addr,
            listener,
            ws_prefix: config.ws_prefix.trim_end_matches('/').to_string(),
            handle: ServerHandle {
                store,
                hub: Arc::new(ClientHub::new()),
                shutdown: ShutdownSignal::new(),
                sessions: SessionTracker::new(),
                serving: Arc::new(AtomicBool::new(false)),
                served: ShutdownSignal::new(),
            },
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Serves until [`ServerHandle::stop`] is called.
    pub async fn run(self) -> Result<(), ServerError> {
        let state = AppState {
            store: self.handle.store.clone(),
            hub: self.handle.hub.clone(),
            shutdown: self.handle.shutdown.clone(),
            sessions: self.handle.sessions.clone(),
        };
        let app = Router::new()
            .route("/health", get(health_handler))
            .route(&format!("{}/{{app}}", self.ws_prefix), get(ws_handler))
            .with_state(state);

        let shutdown = self.handle.shutdown.clone();
        self.handle.serving.store(true, Ordering::SeqCst);
        tracing::info!(addr = %self.addr, "debug host listening");
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
            })
            .into_future()
            .await;

        // The listener is closed once serve returns.
        self.handle.served.signal();
        result?;
        tracing::info!("debug host stopped");
        Ok(())
    }
}

/// Clonable control surface for a running [`DebugServer`].
#[derive(Clone)]
pub struct ServerHandle {
    store: EventStore,
    hub: Arc<ClientHub>,
    shutdown: ShutdownSignal,
    sessions: SessionTracker,
    serving: Arc<AtomicBool>,
    served: ShutdownSignal,
}

impl ServerHandle {
    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Broadcasts to every connected application; returns the recipient count.
    ///
    /// A `SET_STATE` index is resolved against this host's history first and
    /// the snapshot travels with the command. Unknown or malformed indices are
    /// not sent.
    pub fn send_command(&self, command: &DebugCommand) -> usize {
        match resolve_set_state(command, &self.store) {
            Ok(resolved) => self.hub.broadcast(&resolved),
            Err(reason) => {
                tracing::debug!(
                    target_name = %command.target,
                    payload = %command.payload,
                    ?reason,
                    "command not sent"
                );
                0
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.hub.connection_count()
    }

    pub fn connected_apps(&self) -> Vec<String> {
        self.hub.apps()
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_shutting_down()
    }

    /// Closes the listener and every socket, waits for them to finish, then
    /// clears the store.
    pub async fn stop(&self) {
        if !self.shutdown.signal() {
            return;
        }
        tracing::info!("debug host stopping");
        self.hub.close_all();
        if self.serving.load(Ordering::SeqCst) {
            self.served.wait().await;
        }
        self.sessions.idle().await;
        self.store.clear();
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(app): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        session::run_ws_session(
            socket,
            app,
            state.store,
            state.hub,
            state.shutdown,
            state.sessions,
        )
    })
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mvi-devtools",
        "clients": state.hub.connection_count(),
        "events": state.store.len(),
    }))
}

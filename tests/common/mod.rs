//! Shared test utilities.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mvi_devtools::config::{ServerConfig, SessionConfig};
use mvi_devtools::server::{DebugServer, ServerHandle};
use mvi_devtools::store::{EventStore, StoreLimits};
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub task: JoinHandle<()>,
}

/// Binds a debug host on an ephemeral loopback port and starts serving.
pub async fn start_server(limits: StoreLimits) -> TestServer {
    start_server_at("127.0.0.1:0".parse().expect("loopback"), limits).await
}

/// Binds a debug host on `addr` and starts serving.
pub async fn start_server_at(addr: SocketAddr, limits: StoreLimits) -> TestServer {
    let config = ServerConfig {
        bind_addr: addr.to_string(),
        ..ServerConfig::default()
    };
    let server = DebugServer::bind(&config, EventStore::new(limits))
        .await
        .expect("Failed to bind debug host");
    let addr = server.local_addr();
    let handle = server.handle();
    let task = tokio::spawn(async move {
        let _ = server.run().await;
    });
    TestServer { addr, handle, task }
}

pub fn session_config(addr: SocketAddr, app: &str) -> SessionConfig {
    SessionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        app_name: app.to_string(),
        reconnect_attempts: 0,
        reconnect_backoff_ms: 10,
        ..SessionConfig::default()
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

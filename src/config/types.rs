use serde::{Deserialize, Serialize};

use crate::registry::RegistrationPolicy;
use crate::store::StoreLimits;

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: SessionConfig,
    #[serde(default)]
    pub store: StoreLimits,
}

/// Debug host listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the websocket host (host:port, port 0 picks a free one).
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Prefix of the websocket route; applications connect to `{prefix}/{app}`.
    #[serde(default = "default_ws_prefix")]
    pub ws_prefix: String,
}

/// Connection settings used inside the instrumented application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Application name, used for the default path `/ws/{app_name}`.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Explicit websocket path; overrides the one derived from `app_name`.
    #[serde(default)]
    pub path: Option<String>,
    /// Reconnect attempts after a failed connect or a dropped socket (default: 3).
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    /// Linear backoff step between reconnect attempts in milliseconds (default: 500).
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Capacity of the in-process state journal used for time travel (default: 500).
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,
    #[serde(default)]
    pub registration_policy: RegistrationPolicy,
}

impl SessionConfig {
    pub fn ws_path(&self) -> String {
        match &self.path {
            Some(path) => path.clone(),
            None => format!("{}/{}", default_ws_prefix(), self.app_name),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.ws_path())
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_ws_prefix() -> String {
    "/ws".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_name() -> String {
    "app".to_string()
}

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_backoff_ms() -> u64 {
    500
}

fn default_journal_capacity() -> usize {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            ws_prefix: default_ws_prefix(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app_name: default_app_name(),
            path: None,
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            journal_capacity: default_journal_capacity(),
            registration_policy: RegistrationPolicy::default(),
        }
    }
}

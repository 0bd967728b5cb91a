use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/mvi-devtools/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("mvi-devtools").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Buffer capacities are non-zero
    /// - The bind address parses
    /// - Websocket paths start with `/`
    /// - The application name is not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.log_capacity == 0 || self.store.history_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "Store capacities must be greater than zero".to_string(),
            });
        }

        if self.client.journal_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "Client journal capacity must be greater than zero".to_string(),
            });
        }

        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError {
                message: format!("Invalid bind address '{}'", self.server.bind_addr),
            });
        }

        if !self.server.ws_prefix.starts_with('/') {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Websocket prefix '{}' must start with '/'",
                    self.server.ws_prefix
                ),
            });
        }

        if let Some(path) = &self.client.path {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError {
                    message: format!("Client path '{}' must start with '/'", path),
                });
            }
        }

        if self.client.app_name.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Client app_name must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

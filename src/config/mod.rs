//! TOML configuration for the debug host and the in-app session.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, ServerConfig, SessionConfig};

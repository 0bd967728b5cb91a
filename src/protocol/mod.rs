//! Wire schema shared by instrumented applications and the debug host.
//!
//! One JSON object per websocket text frame. Events flow application → host,
//! commands flow host → application.

mod command;
mod event;

pub use command::{CommandKind, DebugCommand};
pub use event::{derive_type_tag, ActionDescriptor, DebugEvent, EventKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed {what} frame: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_event(event: &DebugEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|source| ProtocolError::Encode {
        what: "event",
        source,
    })
}

pub fn decode_event(frame: &str) -> Result<DebugEvent, ProtocolError> {
    serde_json::from_str(frame).map_err(|source| ProtocolError::Decode {
        what: "event",
        source,
    })
}

pub fn encode_command(command: &DebugCommand) -> Result<String, ProtocolError> {
    serde_json::to_string(command).map_err(|source| ProtocolError::Encode {
        what: "command",
        source,
    })
}

pub fn decode_command(frame: &str) -> Result<DebugCommand, ProtocolError> {
    serde_json::from_str(frame).map_err(|source| ProtocolError::Decode {
        what: "command",
        source,
    })
}

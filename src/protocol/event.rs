use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// What a state holder reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Action,
    StateChange,
    Effect,
    Error,
    Network,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Action => "ACTION",
            EventKind::StateChange => "STATE_CHANGE",
            EventKind::Effect => "EFFECT",
            EventKind::Error => "ERROR",
            EventKind::Network => "NETWORK",
        }
    }
}

/// Structured description of a dispatched action.
///
/// Produced by the state holder alongside the rendered payload so that the
/// collector does not have to take the rendered string apart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "typeName")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl ActionDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// One record streamed from an instrumented application to the debug host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "viewModelName")]
    pub target: String,
    pub payload: String,
    #[serde(
        rename = "additionalData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_data: Option<String>,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionDescriptor>,
}

impl DebugEvent {
    pub fn new(kind: EventKind, target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            payload: payload.into(),
            additional_data: None,
            timestamp: now_millis(),
            action: None,
        }
    }

    pub fn action(target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(EventKind::Action, target, payload)
    }

    /// State change; `previous` is the prior dump used for diffing.
    pub fn state_change(
        target: impl Into<String>,
        state: impl Into<String>,
        previous: Option<String>,
    ) -> Self {
        Self::new(EventKind::StateChange, target, state).with_additional_data(previous)
    }

    pub fn effect(target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(EventKind::Effect, target, payload)
    }

    pub fn error(
        target: impl Into<String>,
        message: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        Self::new(EventKind::Error, target, message).with_additional_data(context)
    }

    pub fn network(
        target: impl Into<String>,
        tag: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self::new(EventKind::Network, target, tag).with_additional_data(Some(phase.into()))
    }

    pub fn with_additional_data(mut self, data: Option<String>) -> Self {
        self.additional_data = data;
        self
    }

    pub fn with_descriptor(mut self, descriptor: ActionDescriptor) -> Self {
        self.action = Some(descriptor);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Key used to group action suggestions.
    ///
    /// Prefers the structured descriptor; falls back to the rendered payload.
    pub fn action_type_tag(&self) -> String {
        match &self.action {
            Some(descriptor) if !descriptor.type_name.is_empty() => descriptor.type_name.clone(),
            _ => derive_type_tag(&self.payload).to_string(),
        }
    }
}

/// Substring of a rendered action before the first `(` or `.`.
pub fn derive_type_tag(payload: &str) -> &str {
    let end = payload.find(['(', '.']).unwrap_or(payload.len());
    payload[..end].trim()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    SetState,
    InjectAction,
}

/// Instruction sent from the debug host back into a running application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugCommand {
    #[serde(rename = "type")]
    pub kind: CommandKind,
    #[serde(rename = "viewModelName")]
    pub target: String,
    pub payload: String,
    /// Snapshot the host holds under the `SET_STATE` index, attached when the
    /// host resolves the command. Omitted on the wire when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl DebugCommand {
    /// Restore the state recorded under `index` in the history.
    pub fn set_state(target: impl Into<String>, index: u64) -> Self {
        Self {
            kind: CommandKind::SetState,
            target: target.into(),
            payload: index.to_string(),
            state: None,
        }
    }

    pub fn inject_action(target: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::InjectAction,
            target: target.into(),
            payload: payload.into(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// History index carried by a `SET_STATE` payload.
    pub fn history_index(&self) -> Option<u64> {
        match self.kind {
            CommandKind::SetState => self.payload.trim().parse().ok(),
            CommandKind::InjectAction => None,
        }
    }
}

//! Routes inbound debug commands to registered targets.
//!
//! Misses are expected races (a command arriving after its target went away),
//! so every failure mode resolves to [`DispatchOutcome::Ignored`].

use crate::protocol::{CommandKind, DebugCommand};
use crate::registry::{StateValue, TargetRegistry};
use crate::store::EventStore;

/// Source of historical states addressable by index.
pub trait SnapshotLookup: Send + Sync {
    fn state_at(&self, index: u64) -> Option<StateValue>;
}

impl SnapshotLookup for EventStore {
    fn state_at(&self, index: u64) -> Option<StateValue> {
        self.lookup_history(index)
            .map(|snapshot| StateValue::Encoded(snapshot.item.payload))
    }
}

/// Attaches the snapshot `history` holds under a `SET_STATE` index, so the
/// receiver restores exactly that state regardless of its own numbering.
///
/// Other commands pass through unchanged. Typed snapshots cannot travel and
/// leave the command as is.
pub fn resolve_set_state<L: SnapshotLookup>(
    command: &DebugCommand,
    history: &L,
) -> Result<DebugCommand, IgnoreReason> {
    if command.kind != CommandKind::SetState {
        return Ok(command.clone());
    }
    let index = command
        .history_index()
        .ok_or(IgnoreReason::MalformedIndex)?;
    match history.state_at(index) {
        Some(StateValue::Encoded(dump)) => Ok(command.clone().with_state(dump)),
        Some(StateValue::Typed(_)) => Ok(command.clone()),
        None => Err(IgnoreReason::UnknownIndex),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownTarget,
    UnknownIndex,
    MalformedIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Restored { index: u64 },
    Injected,
    Ignored(IgnoreReason),
}

pub struct CommandDispatcher<L> {
    registry: TargetRegistry,
    history: L,
}

impl<L: SnapshotLookup> CommandDispatcher<L> {
    pub fn new(registry: TargetRegistry, history: L) -> Self {
        Self { registry, history }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn dispatch(&self, command: &DebugCommand) -> DispatchOutcome {
        let outcome = match command.kind {
            CommandKind::SetState => self.restore(command),
            CommandKind::InjectAction => self.inject(command),
        };

        match outcome {
            DispatchOutcome::Ignored(reason) => tracing::debug!(
                target_name = %command.target,
                payload = %command.payload,
                ?reason,
                "debug command ignored"
            ),
            _ => tracing::debug!(
                target_name = %command.target,
                ?outcome,
                "debug command applied"
            ),
        }
        outcome
    }

    fn restore(&self, command: &DebugCommand) -> DispatchOutcome {
        let Some(index) = command.history_index() else {
            return DispatchOutcome::Ignored(IgnoreReason::MalformedIndex);
        };
        let resolved = match &command.state {
            Some(dump) => Some(StateValue::encoded(dump.clone())),
            None => self.history.state_at(index),
        };
        let Some(state) = resolved else {
            return DispatchOutcome::Ignored(IgnoreReason::UnknownIndex);
        };
        let Some(target) = self.registry.lookup(&command.target) else {
            return DispatchOutcome::Ignored(IgnoreReason::UnknownTarget);
        };

        target.restore_state(&state);
        DispatchOutcome::Restored { index }
    }

    fn inject(&self, command: &DebugCommand) -> DispatchOutcome {
        let Some(target) = self.registry.lookup(&command.target) else {
            return DispatchOutcome::Ignored(IgnoreReason::UnknownTarget);
        };

        target.inject_action(&command.payload);
        DispatchOutcome::Injected
    }
}

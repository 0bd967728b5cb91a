//! Application-side entry point: turns state-holder activity into events and
//! applies commands coming back from the debug host.

mod journal;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde::Serialize;

use crate::client::DebugSession;
use crate::config::SessionConfig;
use crate::dispatch::CommandDispatcher;
use crate::protocol::{ActionDescriptor, DebugEvent};
use crate::registry::{StateValue, TargetRegistry};

pub use journal::{JournalEntry, StateJournal};

#[derive(Clone)]
pub struct Inspector {
    session: DebugSession,
    registry: TargetRegistry,
    journal: StateJournal,
    dispatcher: Arc<CommandDispatcher<StateJournal>>,
}

impl Inspector {
    /// Wires `session` so inbound commands resolve against the journal and
    /// are routed through `registry`.
    pub fn new(session: DebugSession, registry: TargetRegistry, journal_capacity: usize) -> Self {
        let journal = StateJournal::new(journal_capacity);
        let dispatcher = Arc::new(CommandDispatcher::new(registry.clone(), journal.clone()));

        let routed = dispatcher.clone();
        session.on_command(move |command| {
            routed.dispatch(&command);
        });

        Self {
            session,
            registry,
            journal,
            dispatcher,
        }
    }

    /// Connects to the host described by `config` in the background.
    pub fn connect(config: SessionConfig) -> Self {
        let registry = TargetRegistry::new(config.registration_policy);
        let capacity = config.journal_capacity;
        Self::new(DebugSession::connect(config), registry, capacity)
    }

    /// An inspector whose events go nowhere.
    pub fn disabled() -> Self {
        let config = SessionConfig::default();
        Self::new(
            DebugSession::sink(),
            TargetRegistry::new(config.registration_policy),
            config.journal_capacity,
        )
    }

    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn journal(&self) -> &StateJournal {
        &self.journal
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<StateJournal> {
        &self.dispatcher
    }

    pub fn record_action(&self, target: &str, action: &impl Debug, descriptor: ActionDescriptor) {
        let event = DebugEvent::action(target, format!("{action:?}")).with_descriptor(descriptor);
        self.session.send(event);
    }

    /// Sends a state change and journals the typed state for time travel.
    ///
    /// Returns the history index, or `None` if the state could not be encoded.
    pub fn record_state<S>(&self, target: &str, state: &S, previous: Option<&S>) -> Option<u64>
    where
        S: Serialize + Any + Clone + Send + Sync,
    {
        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(target_name = target, error = %err, "state is not serializable");
                return None;
            }
        };
        let previous = previous.and_then(|prev| serde_json::to_string(prev).ok());

        let entry = JournalEntry {
            target: target.to_string(),
            state: StateValue::typed(state.clone()),
        };
        let index = self.journal.record_with(entry, |_| {
            self.session
                .send(DebugEvent::state_change(target, payload, previous));
        });
        Some(index)
    }

    pub fn record_effect(&self, target: &str, effect: &impl Debug) {
        self.session
            .send(DebugEvent::effect(target, format!("{effect:?}")));
    }

    pub fn record_error(&self, target: &str, message: &str, context: Option<String>) {
        self.session
            .send(DebugEvent::error(target, message, context));
    }

    pub fn record_network(&self, target: &str, tag: &str, phase: &str) {
        self.session.send(DebugEvent::network(target, tag, phase));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::SnapshotLookup;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CartState {
        items: u32,
    }

    #[test]
    fn journal_indices_follow_send_order() {
        let inspector = Inspector::disabled();
        let first = inspector.record_state("Cart", &CartState { items: 1 }, None);
        let second = inspector.record_state(
            "Cart",
            &CartState { items: 2 },
            Some(&CartState { items: 1 }),
        );

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        let state = inspector.journal().state_at(2).expect("journaled");
        assert_eq!(state.cast::<CartState>(), Some(CartState { items: 2 }));
    }

    #[test]
    fn disabled_inspector_discards_events() {
        let inspector = Inspector::disabled();
        inspector.record_effect("Cart", &"ShowToast");
        inspector.record_error("Cart", "boom", None);
        inspector.record_network("Cart", "GET /cart", "started");
        assert_eq!(inspector.session().stats().discarded, 3);
    }
}

//! State holder that reports its activity to an [`Inspector`] and accepts
//! debug commands for itself.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::intent::Intent;
use super::reducer::Reducer;
use crate::inspector::Inspector;
use crate::registry::{CommandTarget, Registration, StateValue};

enum Enrollment {
    Pending,
    Registered { _guard: Registration },
    Refused,
    Disposed,
}

pub struct Container<R: Reducer> {
    name: String,
    state: Mutex<R::State>,
    inspector: Inspector,
    enrollment: Mutex<Enrollment>,
    this: Weak<Self>,
}

impl<R> Container<R>
where
    R: Reducer + 'static,
{
    /// Creates a container named `name`. Registration with the inspector's
    /// registry happens on the first dispatch.
    pub fn new(name: impl Into<String>, initial: R::State, inspector: Inspector) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            name,
            state: Mutex::new(initial),
            inspector,
            enrollment: Mutex::new(Enrollment::Pending),
            this: this.clone(),
        })
    }

    pub fn with_default_state(name: impl Into<String>, inspector: Inspector) -> Arc<Self> {
        Self::new(name, R::State::default(), inspector)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> R::State {
        self.state.lock().clone()
    }

    pub fn is_registered(&self) -> bool {
        matches!(*self.enrollment.lock(), Enrollment::Registered { .. })
    }

    /// Reports the intent, reduces it and reports the resulting state if it changed.
    pub fn dispatch(&self, intent: R::Intent) -> R::State {
        self.ensure_registered();
        self.inspector
            .record_action(&self.name, &intent, intent.describe());

        // Reported under the state lock so reports follow reduction order.
        let mut state = self.state.lock();
        let previous = state.clone();
        let next = R::reduce(previous.clone(), intent);
        if next != previous {
            self.inspector
                .record_state(&self.name, &next, Some(&previous));
        }
        *state = next.clone();
        next
    }

    pub fn emit_effect(&self, effect: &impl Debug) {
        self.inspector.record_effect(&self.name, effect);
    }

    pub fn report_error(&self, message: &str, context: Option<String>) {
        self.inspector.record_error(&self.name, message, context);
    }

    pub fn report_network(&self, tag: &str, phase: &str) {
        self.inspector.record_network(&self.name, tag, phase);
    }

    /// Ends the container's debug scope. Commands addressed to it are ignored
    /// afterwards and it never registers again.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.enrollment.lock(), Enrollment::Disposed);
        if matches!(previous, Enrollment::Registered { .. }) {
            tracing::debug!(target_name = %self.name, "container disposed");
        }
    }

    fn ensure_registered(&self) {
        let mut enrollment = self.enrollment.lock();
        if !matches!(*enrollment, Enrollment::Pending) {
            return;
        }

        let target: Weak<dyn CommandTarget> = self.this.clone();
        *enrollment = match self.inspector.registry().register(self.name.clone(), target) {
            Ok(registration) => Enrollment::Registered { _guard: registration },
            Err(err) => {
                tracing::warn!(error = %err, "container will not receive debug commands");
                Enrollment::Refused
            }
        };
    }
}

impl<R> CommandTarget for Container<R>
where
    R: Reducer + 'static,
{
    fn restore_state(&self, state: &StateValue) {
        let Some(restored) = state.cast::<R::State>() else {
            tracing::debug!(target_name = %self.name, "ignoring state of another type");
            return;
        };

        let mut current = self.state.lock();
        if restored != *current {
            self.inspector
                .record_state(&self.name, &restored, Some(&*current));
        }
        *current = restored;
    }

    fn inject_action(&self, payload: &str) {
        match R::Intent::parse(payload) {
            Some(intent) => {
                self.dispatch(intent);
            }
            None => {
                tracing::debug!(target_name = %self.name, payload, "ignoring unrecognized injected action");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::dispatch::DispatchOutcome;
    use crate::mvi::UiState;
    use crate::protocol::DebugCommand;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    impl UiState for Counter {}

    #[derive(Debug)]
    enum CounterIntent {
        Add(i64),
        Reset,
    }

    impl Intent for CounterIntent {
        fn parse(payload: &str) -> Option<Self> {
            match payload.trim() {
                "Reset" => Some(Self::Reset),
                other => other
                    .strip_prefix("Add(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|n| n.parse().ok())
                    .map(Self::Add),
            }
        }
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = Counter;
        type Intent = CounterIntent;

        fn reduce(state: Counter, intent: CounterIntent) -> Counter {
            match intent {
                CounterIntent::Add(n) => Counter {
                    value: state.value + n,
                },
                CounterIntent::Reset => Counter::default(),
            }
        }
    }

    fn counter(inspector: &Inspector) -> Arc<Container<CounterReducer>> {
        Container::with_default_state("Counter", inspector.clone())
    }

    #[test]
    fn registers_on_first_dispatch() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        assert!(!container.is_registered());

        container.dispatch(CounterIntent::Add(1));
        assert!(container.is_registered());
        assert!(inspector.registry().contains("Counter"));
    }

    #[test]
    fn unchanged_state_is_not_journaled() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        container.dispatch(CounterIntent::Reset);
        assert!(inspector.journal().is_empty());

        container.dispatch(CounterIntent::Add(2));
        assert_eq!(inspector.journal().len(), 1);
    }

    #[test]
    fn set_state_restores_journaled_snapshot() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        container.dispatch(CounterIntent::Add(1));
        container.dispatch(CounterIntent::Add(10));
        assert_eq!(container.state().value, 11);

        let outcome = inspector
            .dispatcher()
            .dispatch(&DebugCommand::set_state("Counter", 1));
        assert_eq!(outcome, DispatchOutcome::Restored { index: 1 });
        assert_eq!(container.state().value, 1);
    }

    #[test]
    fn injected_action_is_parsed_and_dispatched() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        container.dispatch(CounterIntent::Add(1));

        inspector
            .dispatcher()
            .dispatch(&DebugCommand::inject_action("Counter", "Add(41)"));
        assert_eq!(container.state().value, 42);

        inspector
            .dispatcher()
            .dispatch(&DebugCommand::inject_action("Counter", "Multiply(2)"));
        assert_eq!(container.state().value, 42);
    }

    #[test]
    fn dispose_deregisters() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        container.dispatch(CounterIntent::Add(1));
        container.dispose();

        assert!(!inspector.registry().contains("Counter"));
        container.dispatch(CounterIntent::Add(1));
        assert!(!container.is_registered());
    }

    #[test]
    fn dropped_container_is_not_a_target() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);
        container.dispatch(CounterIntent::Add(1));
        drop(container);

        assert!(inspector.registry().lookup("Counter").is_none());
    }

    #[test]
    fn reject_policy_refuses_duplicate_names() {
        let config = SessionConfig {
            registration_policy: crate::registry::RegistrationPolicy::Reject,
            ..SessionConfig::default()
        };
        let inspector = Inspector::new(
            crate::client::DebugSession::sink(),
            crate::registry::TargetRegistry::new(config.registration_policy),
            config.journal_capacity,
        );
        let first = counter(&inspector);
        let second = counter(&inspector);
        first.dispatch(CounterIntent::Add(1));
        second.dispatch(CounterIntent::Add(1));

        assert!(first.is_registered());
        assert!(!second.is_registered());
    }

    #[test]
    fn concurrent_dispatches_are_journaled_in_reduction_order() {
        let inspector = Inspector::disabled();
        let container = counter(&inspector);

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        container.dispatch(CounterIntent::Add(1));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        let journal = inspector.journal();
        let last = journal.last_index();
        assert_eq!(last, 1600);
        assert_eq!(container.state().value, 1600);

        let retained = journal.len() as u64;
        let mut expected = (last - retained + 1) as i64;
        for index in (last - retained + 1)..=last {
            let entry = journal.get(index).expect("retained entry");
            assert_eq!(entry.state.cast::<Counter>(), Some(Counter { value: expected }));
            expected += 1;
        }
    }
}

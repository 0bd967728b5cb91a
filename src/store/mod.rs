//! In-memory collector for events streamed by instrumented applications.
//!
//! Four bounded or keyed views are kept behind a single lock so that readers
//! always see latest-state, history and log updated together:
//!
//! - event log (ring buffer, newest last)
//! - latest state per target
//! - state history for time travel (ring buffer of indexed snapshots)
//! - action suggestions per target, keyed by action type

mod notify;
mod ring;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::protocol::{DebugEvent, EventKind};

pub use notify::DataChangedCallback;
pub use ring::{History, IndexedSnapshot, RingBuffer};

use notify::ChangeNotifier;

/// Capacities of the bounded views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreLimits {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_log_capacity() -> usize {
    1000
}

fn default_history_capacity() -> usize {
    500
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            history_capacity: default_history_capacity(),
        }
    }
}

pub type Suggestions = HashMap<String, HashMap<String, String>>;

/// Consistent copy of every view, taken under one lock.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub logs: Vec<DebugEvent>,
    pub latest_states: HashMap<String, String>,
    pub history: Vec<IndexedSnapshot<DebugEvent>>,
    pub suggestions: Suggestions,
}

/// Shared, thread-safe event collector. Clones share the same data.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    limits: StoreLimits,
    views: Mutex<StoreViews>,
    notifier: ChangeNotifier,
}

struct StoreViews {
    logs: RingBuffer<DebugEvent>,
    latest_states: HashMap<String, String>,
    history: History<DebugEvent>,
    suggestions: Suggestions,
}

impl StoreViews {
    fn new(limits: StoreLimits) -> Self {
        Self {
            logs: RingBuffer::new(limits.log_capacity),
            latest_states: HashMap::new(),
            history: History::new(limits.history_capacity),
            suggestions: HashMap::new(),
        }
    }
}

impl EventStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                limits,
                views: Mutex::new(StoreViews::new(limits)),
                notifier: ChangeNotifier::new(),
            }),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.inner.limits
    }

    /// Records one event. Returns the history index if it was a state change.
    pub fn ingest(&self, event: DebugEvent) -> Option<u64> {
        let index = {
            let mut views = self.inner.views.lock();
            let mut index = None;

            match event.kind {
                EventKind::Action => {
                    views
                        .suggestions
                        .entry(event.target.clone())
                        .or_default()
                        .insert(event.action_type_tag(), event.payload.clone());
                }
                EventKind::StateChange => {
                    views
                        .latest_states
                        .insert(event.target.clone(), event.payload.clone());
                    index = Some(views.history.push(event.clone()));
                }
                EventKind::Effect | EventKind::Error | EventKind::Network => {}
            }

            tracing::trace!(
                kind = event.kind.as_str(),
                target_name = %event.target,
                "event ingested"
            );
            views.logs.push(event);
            index
        };

        self.inner.notifier.notify();
        index
    }

    pub fn snapshot_logs(&self) -> Vec<DebugEvent> {
        self.inner.views.lock().logs.to_vec()
    }

    pub fn snapshot_latest_states(&self) -> HashMap<String, String> {
        self.inner.views.lock().latest_states.clone()
    }

    pub fn snapshot_history(&self) -> Vec<IndexedSnapshot<DebugEvent>> {
        self.inner.views.lock().history.to_vec()
    }

    pub fn snapshot_suggestions(&self) -> Suggestions {
        self.inner.views.lock().suggestions.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let views = self.inner.views.lock();
        StoreSnapshot {
            logs: views.logs.to_vec(),
            latest_states: views.latest_states.clone(),
            history: views.history.to_vec(),
            suggestions: views.suggestions.clone(),
        }
    }

    /// Log entries for `target` (any target when `None`) whose kind is in `kinds`
    /// (any kind when empty), oldest first.
    pub fn filter_logs(&self, target: Option<&str>, kinds: &[EventKind]) -> Vec<DebugEvent> {
        let views = self.inner.views.lock();
        views
            .logs
            .iter()
            .filter(|event| target.map_or(true, |target| event.target == target))
            .filter(|event| kinds.is_empty() || kinds.contains(&event.kind))
            .cloned()
            .collect()
    }

    pub fn lookup_history(&self, index: u64) -> Option<IndexedSnapshot<DebugEvent>> {
        self.inner.views.lock().history.find(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.views.lock().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties every view and restarts history numbering.
    pub fn clear(&self) {
        {
            let mut views = self.inner.views.lock();
            views.logs.clear();
            views.latest_states.clear();
            views.history.reset();
            views.suggestions.clear();
        }
        tracing::debug!("event store cleared");
        self.inner.notifier.notify();
    }

    /// Registers a callback run on the notifier thread after every mutation.
    pub fn on_data_changed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.notifier.add_observer(Arc::new(callback));
    }

    /// Revision counter bumped on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.notifier.subscribe()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(StoreLimits::default())
    }
}

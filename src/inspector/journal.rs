use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::SnapshotLookup;
use crate::registry::StateValue;
use crate::store::History;

#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub target: String,
    pub state: StateValue,
}

/// Typed copy of every state sent to the host, numbered the same way the
/// host numbers its history (1, 2, ... in send order).
#[derive(Clone)]
pub struct StateJournal {
    history: Arc<Mutex<History<JournalEntry>>>,
}

impl StateJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: Arc::new(Mutex::new(History::new(capacity))),
        }
    }

    /// Runs `send` with the index assigned to `entry` while holding the
    /// journal lock, so indices and send order cannot diverge.
    pub(crate) fn record_with<F>(&self, entry: JournalEntry, send: F) -> u64
    where
        F: FnOnce(u64),
    {
        let mut history = self.history.lock();
        let index = history.push(entry);
        send(index);
        index
    }

    pub fn get(&self, index: u64) -> Option<JournalEntry> {
        self.history
            .lock()
            .find(index)
            .map(|snapshot| snapshot.item.clone())
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_index(&self) -> u64 {
        self.history.lock().last_index()
    }
}

impl SnapshotLookup for StateJournal {
    fn state_at(&self, index: u64) -> Option<StateValue> {
        self.get(index).map(|entry| entry.state)
    }
}

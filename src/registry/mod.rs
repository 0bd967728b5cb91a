//! Name → live target table used to route debug commands.
//!
//! Targets register lazily and hold a [`Registration`] guard; dropping the
//! guard removes the entry unless a newer registration already replaced it.
//! Entries hold weak references so a registered target can still be dropped.

mod state;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use state::StateValue;

/// Operations a debug command can perform on a registered target.
pub trait CommandTarget: Send + Sync {
    /// Replace the current state; a value of the wrong type is ignored.
    fn restore_state(&self, state: &StateValue);

    /// Map `payload` to a concrete action and dispatch it; unrecognized
    /// payloads are ignored.
    fn inject_action(&self, payload: &str);
}

/// What happens when a name is registered while a live entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// The newer registration replaces the old one.
    #[default]
    LastWins,
    /// The newer registration is refused.
    Reject,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Target '{name}' is already registered")]
    AlreadyRegistered { name: String },
}

#[derive(Clone)]
pub struct TargetRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    policy: RegistrationPolicy,
    entries: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
}

struct Entry {
    token: u64,
    target: Weak<dyn CommandTarget>,
}

impl TargetRegistry {
    pub fn new(policy: RegistrationPolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                policy,
                entries: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.inner.policy
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        target: Weak<dyn CommandTarget>,
    ) -> Result<Registration, RegistryError> {
        let name = name.into();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.inner.entries.lock();

        let live = entries
            .get(&name)
            .is_some_and(|entry| entry.target.strong_count() > 0);
        if live {
            match self.inner.policy {
                RegistrationPolicy::Reject => {
                    return Err(RegistryError::AlreadyRegistered { name });
                }
                RegistrationPolicy::LastWins => {
                    tracing::debug!(target_name = %name, "replacing existing registration");
                }
            }
        }

        entries.insert(name.clone(), Entry { token, target });
        tracing::debug!(target_name = %name, "target registered");

        Ok(Registration {
            name,
            token,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Live target registered under `name`. Stale entries are pruned.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandTarget>> {
        let mut entries = self.inner.entries.lock();
        let target = entries.get(name)?.target.upgrade();
        if target.is_none() {
            entries.remove(name);
        }
        target
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let entries = self.inner.entries.lock();
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.target.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new(RegistrationPolicy::default())
    }
}

/// Keeps a registry entry alive. Dropping it deregisters the target.
pub struct Registration {
    name: String,
    token: u64,
    registry: Weak<RegistryInner>,
}

impl Registration {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut entries = registry.entries.lock();
        if entries.get(&self.name).is_some_and(|entry| entry.token == self.token) {
            entries.remove(&self.name);
            tracing::debug!(target_name = %self.name, "target deregistered");
        }
    }
}

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

/// State handed to a target by a restore command.
///
/// `Typed` comes from the in-process journal and is recovered by downcast;
/// `Encoded` comes from the collector's history and is recovered by parsing.
#[derive(Clone)]
pub enum StateValue {
    Typed(Arc<dyn Any + Send + Sync>),
    Encoded(String),
}

impl StateValue {
    pub fn typed<S: Any + Send + Sync>(state: S) -> Self {
        StateValue::Typed(Arc::new(state))
    }

    pub fn encoded(dump: impl Into<String>) -> Self {
        StateValue::Encoded(dump.into())
    }

    /// Attempts to recover an `S`; `None` on a type mismatch.
    pub fn cast<S>(&self) -> Option<S>
    where
        S: Clone + DeserializeOwned + 'static,
    {
        match self {
            StateValue::Typed(value) => value.downcast_ref::<S>().cloned(),
            StateValue::Encoded(dump) => serde_json::from_str(dump).ok(),
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Typed(_) => f.write_str("StateValue::Typed(..)"),
            StateValue::Encoded(dump) => f.debug_tuple("StateValue::Encoded").field(dump).finish(),
        }
    }
}

//! Base trait for intents (user/system actions).

use std::fmt::Debug;

use crate::protocol::ActionDescriptor;

/// Intents are processed by reducers to produce new states.
///
/// The `Debug` rendering is what the debug host displays as the action payload.
pub trait Intent: Debug + Send + 'static {
    /// Structured description sent alongside the rendered action.
    ///
    /// Defaults to the leading identifier of the `Debug` rendering, with no fields.
    fn describe(&self) -> ActionDescriptor {
        let rendered = format!("{self:?}");
        let name: String = rendered
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        ActionDescriptor::new(name)
    }

    /// Builds an intent from an injected payload. Unparseable payloads yield `None`.
    fn parse(_payload: &str) -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

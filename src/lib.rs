//! Remote debugging for MVI state containers.
//!
//! Applications report actions, state changes, effects, errors and network
//! activity to a debug host over a websocket. The host keeps bounded logs and
//! a numbered state history, and can send commands back to restore an earlier
//! state or inject an action.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod inspector;
pub mod logging;
pub mod mvi;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod store;

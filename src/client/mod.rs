//! In-app transport: streams events to the debug host and receives commands.
//!
//! A debugging aid must never crash or stall the application it observes, so
//! every transport failure ends in sink mode instead of an error.

mod session;

pub use session::{CommandCallback, ConnectionStatus, DebugSession, SessionStats};

//! Model-View-Intent primitives with built-in debug reporting.
//!
//! ```text
//! Intent ──→ Reducer ──→ State ──→ Inspector ──→ debug host
//!    ↑                                               │
//!    └──────────── SET_STATE / INJECT_ACTION ────────┘
//! ```
//!
//! - **State**: Immutable snapshot owned by a [`Container`]
//! - **Intent**: User actions or system events
//! - **Reducer**: Pure function that transforms state based on intents

mod container;
mod intent;
mod reducer;
mod state;

pub use container::Container;
pub use intent::Intent;
pub use reducer::Reducer;
pub use state::UiState;

//! Base trait for state held by a container.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker trait for state objects.
///
/// States should be:
/// - Immutable (Clone to create new states)
/// - Comparable (PartialEq for detecting changes)
/// - Serializable, so the debug host can display and restore them
pub trait UiState:
    Clone + PartialEq + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

//! Typed representations of Engine API payloads.

use serde::Deserialize;

pub mod event;
pub mod image;
pub mod version;

pub use event::{EngineEvent, EventActor};
pub use image::ImageHistoryEntry;
pub use version::VersionInfo;

/// Deserialize `null` as the type's default value.
///
/// The Engine API emits `"Tags": null` and similar for absent collections.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de> + Default,
{
    let value = Option::<T>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

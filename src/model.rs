//! Core data model.
//!
//! Records are the shifts and tasks held by the document store. Snapshots of
//! a record are diffed into events; events are rendered into notifications
//! and fanned out to device endpoints, producing a delivery report.

pub mod delivery;
pub mod event;
pub mod notification;
pub mod record;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a field that may be missing, `null`, or present, defaulting the
/// first two cases. Store documents were written by several app versions.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a list of entries one element at a time. An element that does not
/// decode becomes `T::default()`, so it still occupies its position in the
/// log without failing the whole document.
pub(crate) fn entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw: Vec<Value> = nullable(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .collect())
}

/// A field that counts only when it holds a string; any other JSON value
/// reads as absent.
pub(crate) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

//! Data models for haven.
//!
//! The remote store is authoritative for contacts, emergency events and
//! incident reports; the types here are transient copies. Sessions, samples
//! and media blobs are process-local.

mod contact;
mod location;
mod media;
mod records;
mod user;

pub use contact::{Contact, NewContact};
pub use location::{DEFAULT_MAPS_BASE_URL, Location, LocationError, LocationSample};
pub use media::{MediaBlob, MediaKind};
pub use records::{
    EmergencyEvent, EventStatus, IncidentReport, LocationUpdate, NewIncidentReport, ReportStatus,
};
pub use user::UserId;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads a row key that may be a UUID string or an integer.
fn id_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Err(serde::de::Error::custom("missing row id")),
        other => Ok(other.to_string()),
    }
}

/// Like [`id_as_text`] but tolerates a missing or null key.
fn optional_id_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

//! Remote row store abstraction.
//!
//! The backend-as-a-service is authoritative for contacts, emergency events,
//! location history, incident reports and recording backups. Haven treats it
//! as an opaque row store plus a blob bucket:
//!
//! - [`RemoteStore`]: `select`/`insert`/`update`/`delete` on JSON rows and `upload` for blobs
//! - [`SupabaseStore`]: PostgREST + Storage over HTTPS
//! - [`MemoryStore`]: in-process tables for development and tests
//!
//! Typed repositories ([`ContactRepository`], [`EmergencyEventRepository`],
//! [`IncidentRepository`]) sit on top and own the table names.

// Allow significant_drop_tightening - the in-memory tables hold locks briefly.
#![allow(clippy::significant_drop_tightening)]

mod contacts;
mod events;
mod incidents;
mod memory;
mod supabase;

pub use contacts::{CONTACTS_TABLE, ContactRepository, LEGACY_CONTACTS_TABLE};
pub use events::{EMERGENCY_EVENTS_TABLE, EmergencyEventRepository, LOCATION_UPDATES_TABLE};
pub use incidents::{INCIDENT_REPORTS_TABLE, IncidentRepository};
pub use memory::{MemoryStore, StoredObject};
pub use supabase::SupabaseStore;

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;

/// A row as returned by the store: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Bucket holding recording backups.
pub const RECORDINGS_BUCKET: &str = "recordings";

/// Row filter: equality conditions, optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Filter {
    /// Matches every row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` condition.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }

    /// Orders results by `column`.
    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    /// Caps the number of rows returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Equality conditions in insertion order.
    #[must_use]
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Ordering column and direction (`true` = ascending).
    #[must_use]
    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.order.as_ref().map(|(c, asc)| (c.as_str(), *asc))
    }

    /// Row cap, if any.
    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether `row` satisfies every condition.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }

    /// Applies ordering and limit to already-matched rows.
    #[must_use]
    pub fn shape(&self, mut rows: Vec<Row>) -> Vec<Row> {
        if let Some((column, ascending)) = self.ordering() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(column), b.get(column));
                if ascending { ord } else { ord.reverse() }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Options for a blob upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// MIME type stored with the object.
    pub content_type: String,
    /// Overwrite an existing object at the same path.
    pub upsert: bool,
}

/// Opaque row store plus blob storage.
///
/// Implementations must be safe to call from several threads at once; the
/// alert dispatcher and the session controller share one instance.
pub trait RemoteStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Returns rows of `table` matching `filter`.
    fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>>;

    /// Inserts rows and returns them as stored.
    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>>;

    /// Merges `patch` into every matching row and returns the updated rows.
    fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>>;

    /// Deletes matching rows and returns how many were removed.
    fn delete(&self, table: &str, filter: &Filter) -> Result<usize>;

    /// Stores a blob at `bucket/path`.
    fn upload(&self, bucket: &str, path: &str, data: &[u8], options: &UploadOptions)
    -> Result<()>;
}

/// Serializes a value into a row. Fails unless it serializes to an object.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value).map_err(|e| Error::operation("serialize_row", e))? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "row must serialize to an object, got {other}"
        ))),
    }
}

/// Deserializes rows into typed records.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row))
                .map_err(|e| Error::operation("deserialize_row", e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_filter_matches_all_conditions() {
        let filter = Filter::new().eq("user_id", "u1").eq("status", "active");
        assert!(filter.matches(&row(json!({"user_id": "u1", "status": "active", "x": 1}))));
        assert!(!filter.matches(&row(json!({"user_id": "u1", "status": "resolved"}))));
        assert!(!filter.matches(&row(json!({"status": "active"}))));
    }

    #[test]
    fn test_filter_shape_orders_and_limits() {
        let rows = vec![
            row(json!({"created_at": "2024-01-01"})),
            row(json!({"created_at": "2024-03-01"})),
            row(json!({"created_at": "2024-02-01"})),
        ];
        let shaped = Filter::new().order_by("created_at", false).limit(2).shape(rows);
        assert_eq!(shaped.len(), 2);
        assert_eq!(shaped[0]["created_at"], json!("2024-03-01"));
        assert_eq!(shaped[1]["created_at"], json!("2024-02-01"));
    }

    #[test]
    fn test_to_row_rejects_scalars() {
        assert!(to_row(&42).is_err());
        assert!(to_row(&json!({"a": 1})).is_ok());
    }
}

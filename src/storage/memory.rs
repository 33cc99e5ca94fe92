//! In-process row store.
//!
//! Used when `store.backend = "memory"` and throughout the tests. Rows get a
//! UUID `id` and an RFC 3339 `created_at` on insert, mirroring the hosted
//! backend's column defaults.

use super::{Filter, RemoteStore, Row, UploadOptions};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Blob bytes.
    pub data: Vec<u8>,
    /// Content type given at upload.
    pub content_type: String,
}

/// Thread-safe in-memory tables and buckets.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    objects: Mutex<HashMap<String, StoredObject>>,
    failing_tables: HashSet<String>,
    fail_uploads: bool,
    selects: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `table` fail, to exercise error paths.
    #[must_use]
    pub fn with_failing_table(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    /// Makes every upload fail.
    #[must_use]
    pub const fn with_failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    /// Number of `select` calls served so far.
    pub fn select_count(&self) -> usize {
        self.selects.load(Ordering::SeqCst)
    }

    /// Returns a copy of every row in `table`.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the blob stored at `bucket/path`.
    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&object_key(bucket, path))
            .cloned()
    }

    fn check_table(&self, table: &str, operation: &str) -> Result<()> {
        if self.failing_tables.contains(table) {
            return Err(Error::operation(
                operation,
                format!("table '{table}' unavailable"),
            ));
        }
        Ok(())
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{bucket}/{path}")
}

impl RemoteStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        self.selects.fetch_add(1, Ordering::SeqCst);
        self.check_table(table, "store_select")?;
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let matched = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        Ok(filter.shape(matched))
    }

    fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.check_table(table, "store_insert")?;
        let now = chrono::Utc::now().to_rfc3339();
        let stored: Vec<Row> = rows
            .into_iter()
            .map(|mut row| {
                row.entry("id")
                    .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
                row.entry("created_at")
                    .or_insert_with(|| Value::String(now.clone()));
                row
            })
            .collect();

        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<Vec<Row>> {
        self.check_table(table, "store_update")?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.check_table(table, "store_delete")?;
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        Ok(before - rows.len())
    }

    fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: &[u8],
        options: &UploadOptions,
    ) -> Result<()> {
        if self.fail_uploads {
            return Err(Error::operation("store_upload", "storage unavailable"));
        }
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        let key = object_key(bucket, path);
        if !options.upsert && objects.contains_key(&key) {
            return Err(Error::operation(
                "store_upload",
                format!("object already exists: {key}"),
            ));
        }
        objects.insert(
            key,
            StoredObject {
                data: data.to_vec(),
                content_type: options.content_type.clone(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::to_row;
    use serde_json::json;

    #[test]
    fn test_insert_assigns_id_and_created_at() {
        let store = MemoryStore::new();
        let rows = store
            .insert("t", vec![to_row(&json!({"name": "a"})).expect("row")])
            .expect("insert");
        assert!(rows[0].contains_key("id"));
        assert!(rows[0].contains_key("created_at"));
        assert_eq!(store.rows("t").len(), 1);
    }

    #[test]
    fn test_update_and_delete_respect_filter() {
        let store = MemoryStore::new();
        store
            .insert(
                "t",
                vec![
                    to_row(&json!({"k": 1, "v": "a"})).expect("row"),
                    to_row(&json!({"k": 2, "v": "b"})).expect("row"),
                ],
            )
            .expect("insert");

        let patch = to_row(&json!({"v": "z"})).expect("patch");
        let updated = store
            .update("t", &Filter::new().eq("k", 2), patch)
            .expect("update");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["v"], json!("z"));

        assert_eq!(store.delete("t", &Filter::new().eq("k", 1)).expect("delete"), 1);
        assert_eq!(store.rows("t").len(), 1);
        assert_eq!(store.delete("missing", &Filter::new()).expect("delete"), 0);
    }

    #[test]
    fn test_upload_without_upsert_rejects_overwrite() {
        let store = MemoryStore::new();
        let opts = UploadOptions {
            content_type: "video/webm".to_string(),
            upsert: false,
        };
        store.upload("b", "p", b"one", &opts).expect("first upload");
        assert!(store.upload("b", "p", b"two", &opts).is_err());

        let upsert = UploadOptions {
            upsert: true,
            ..opts
        };
        store.upload("b", "p", b"two", &upsert).expect("upsert");
        assert_eq!(store.object("b", "p").expect("object").data, b"two");
    }

    #[test]
    fn test_failing_table() {
        let store = MemoryStore::new().with_failing_table("t");
        assert!(store.select("t", &Filter::new()).is_err());
        assert_eq!(store.select_count(), 1);
    }
}

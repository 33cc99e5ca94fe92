//! Trusted contact repository.

use super::{Filter, RemoteStore, from_rows, to_row};
use crate::models::{Contact, NewContact, UserId};
use crate::{Error, Result};
use std::sync::Arc;

/// Primary contacts table.
pub const CONTACTS_TABLE: &str = "trusted_contacts";

/// Older contacts table still read when the primary one is empty.
pub const LEGACY_CONTACTS_TABLE: &str = "contacts";

/// Reads and writes a user's trusted contacts.
#[derive(Clone)]
pub struct ContactRepository {
    store: Arc<dyn RemoteStore>,
}

impl ContactRepository {
    /// Creates a repository reading `trusted_contacts`, with the legacy
    /// `contacts` table as fallback.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Contacts to alert for `user`.
    ///
    /// Reads `trusted_contacts`; when that yields no rows (or fails), reads the
    /// legacy `contacts` table instead. An error is returned only when no
    /// table could be read at all.
    pub fn contacts_for_alert(&self, user: &UserId) -> Result<Vec<Contact>> {
        let primary_err = match self.list_table(CONTACTS_TABLE, user) {
            Ok(contacts) if !contacts.is_empty() => return Ok(contacts),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    user_id = %user,
                    error = %e,
                    "Primary contacts lookup failed, trying legacy table"
                );
                Some(e)
            },
        };

        match (self.list_table(LEGACY_CONTACTS_TABLE, user), primary_err) {
            (Ok(legacy), _) => {
                if !legacy.is_empty() {
                    tracing::debug!(
                        user_id = %user,
                        count = legacy.len(),
                        "Using legacy contacts table"
                    );
                }
                Ok(legacy)
            },
            (Err(legacy_err), None) => {
                tracing::debug!(error = %legacy_err, "Legacy contacts table unavailable");
                Ok(Vec::new())
            },
            (Err(legacy_err), Some(primary_err)) => Err(Error::operation(
                "fetch_contacts",
                format!("{primary_err}; legacy: {legacy_err}"),
            )),
        }
    }

    /// Trusted contacts for `user` (primary table only).
    pub fn list(&self, user: &UserId) -> Result<Vec<Contact>> {
        self.list_table(CONTACTS_TABLE, user)
    }

    /// First trusted contact, used by the quick "call a contact" action.
    pub fn first(&self, user: &UserId) -> Result<Option<Contact>> {
        Ok(self.list(user)?.into_iter().next())
    }

    /// Adds a contact and returns the stored row.
    pub fn add(&self, contact: &NewContact) -> Result<Contact> {
        if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
            return Err(Error::InvalidInput(
                "contact name and phone are required".to_string(),
            ));
        }
        let stored = self.store.insert(CONTACTS_TABLE, vec![to_row(contact)?])?;
        from_rows::<Contact>(stored)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation("add_contact", "store returned no row"))
    }

    /// Changes a contact's name, phone or relationship.
    pub fn update(
        &self,
        contact_id: &str,
        name: Option<&str>,
        phone: Option<&str>,
        relationship: Option<&str>,
    ) -> Result<Option<Contact>> {
        let mut patch = super::Row::new();
        for (column, value) in [("name", name), ("phone", phone), ("relationship", relationship)] {
            if let Some(value) = value {
                patch.insert(column.to_string(), value.into());
            }
        }
        if patch.is_empty() {
            return Err(Error::InvalidInput("nothing to update".to_string()));
        }
        let updated =
            self.store
                .update(CONTACTS_TABLE, &Filter::new().eq("id", contact_id), patch)?;
        Ok(from_rows::<Contact>(updated)?.into_iter().next())
    }

    /// Removes a contact. Returns whether a row was deleted.
    pub fn remove(&self, contact_id: &str) -> Result<bool> {
        let removed = self
            .store
            .delete(CONTACTS_TABLE, &Filter::new().eq("id", contact_id))?;
        Ok(removed > 0)
    }

    fn list_table(&self, table: &str, user: &UserId) -> Result<Vec<Contact>> {
        let rows = self
            .store
            .select(table, &Filter::new().eq("user_id", user.as_str()))?;
        from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn seed(store: &MemoryStore, table: &str, user: &str, phone: &str) {
        store
            .insert(
                table,
                vec![to_row(&json!({"user_id": user, "name": "C", "phone": phone})).expect("row")],
            )
            .expect("seed");
    }

    #[test]
    fn test_primary_table_wins() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, CONTACTS_TABLE, "u1", "1111111111");
        seed(&store, LEGACY_CONTACTS_TABLE, "u1", "2222222222");

        let repo = ContactRepository::new(store);
        let contacts = repo.contacts_for_alert(&UserId::new("u1")).expect("contacts");
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].phone, "1111111111");
    }

    #[test]
    fn test_falls_back_to_legacy_table() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, LEGACY_CONTACTS_TABLE, "u1", "2222222222");
        seed(&store, CONTACTS_TABLE, "someone-else", "3333333333");

        let repo = ContactRepository::new(store);
        let contacts = repo.contacts_for_alert(&UserId::new("u1")).expect("contacts");
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].phone, "2222222222");
    }

    #[test]
    fn test_errors_only_when_both_tables_fail() {
        let store = Arc::new(
            MemoryStore::new()
                .with_failing_table(CONTACTS_TABLE)
                .with_failing_table(LEGACY_CONTACTS_TABLE),
        );
        let repo = ContactRepository::new(store);
        assert!(repo.contacts_for_alert(&UserId::new("u1")).is_err());

        let store = Arc::new(MemoryStore::new().with_failing_table(LEGACY_CONTACTS_TABLE));
        let repo = ContactRepository::new(store);
        assert!(repo.contacts_for_alert(&UserId::new("u1")).expect("ok").is_empty());
    }

    #[test]
    fn test_add_update_remove() {
        let store = Arc::new(MemoryStore::new());
        let repo = ContactRepository::new(store);
        let user = UserId::new("u1");

        let added = repo
            .add(&NewContact::new(&user, "Asha", "9876543210").with_relationship("Sister"))
            .expect("add");
        let id = added.id.clone().expect("id assigned");
        assert_eq!(added.relationship.as_deref(), Some("Sister"));

        let updated = repo
            .update(&id, None, Some("9000000000"), None)
            .expect("update")
            .expect("row");
        assert_eq!(updated.phone, "9000000000");
        assert_eq!(updated.name, "Asha");

        assert!(repo.remove(&id).expect("remove"));
        assert!(repo.list(&user).expect("list").is_empty());
    }

    #[test]
    fn test_add_requires_name_and_phone() {
        let repo = ContactRepository::new(Arc::new(MemoryStore::new()));
        let result = repo.add(&NewContact::new(&UserId::new("u1"), " ", "123"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

//! Trusted contacts.

use serde::{Deserialize, Serialize};

/// A person the user designated to receive emergency alerts.
///
/// Rows from the legacy `contacts` table may only carry a phone number, so
/// every other column is optional on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Row identifier (UUID or integer key, kept as text).
    #[serde(default, deserialize_with = "super::optional_id_as_text")]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Phone number as entered by the user (not normalized).
    pub phone: String,
    /// Relationship label ("Friend", "Mother", ...).
    #[serde(default)]
    pub relationship: Option<String>,
}

impl Contact {
    /// Creates a contact without a row ID.
    #[must_use]
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            phone: phone.into(),
            relationship: None,
        }
    }

    /// A label for logs and results: the name, or the phone when unnamed.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.phone
        } else {
            &self.name
        }
    }
}

/// Fields for inserting a new trusted contact.
#[derive(Debug, Clone, Serialize)]
pub struct NewContact {
    /// Owner of the contact.
    pub user_id: String,
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Relationship label, defaults to "Friend".
    pub relationship: String,
    /// Presence status shown in the contacts list.
    pub status: String,
}

impl NewContact {
    /// Creates an insert payload with the default relationship and status.
    #[must_use]
    pub fn new(user_id: &crate::models::UserId, name: &str, phone: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            relationship: "Friend".to_string(),
            status: "offline".to_string(),
        }
    }

    /// Sets the relationship label.
    #[must_use]
    pub fn with_relationship(mut self, relationship: impl Into<String>) -> Self {
        self.relationship = relationship.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_deserializes_legacy_row() {
        let row = serde_json::json!({ "phone": "9876543210" });
        let contact: Contact = serde_json::from_value(row).expect("legacy row");
        assert_eq!(contact.phone, "9876543210");
        assert!(contact.name.is_empty());
        assert_eq!(contact.label(), "9876543210");
    }

    #[test]
    fn test_contact_accepts_integer_id() {
        let row = serde_json::json!({ "id": 17, "name": "Ravi", "phone": "+14155550100" });
        let contact: Contact = serde_json::from_value(row).expect("row");
        assert_eq!(contact.id.as_deref(), Some("17"));
        assert_eq!(contact.label(), "Ravi");
    }
}

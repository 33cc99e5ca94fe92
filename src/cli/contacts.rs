//! Contacts CLI command.

use crate::models::{NewContact, UserId};
use crate::services::ServiceContainer;
use crate::{Error, Result};
use std::fmt::Write as _;

/// What to do with a user's trusted contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactsAction {
    /// Print every contact the alert path would use.
    List,
    /// Add a contact.
    Add {
        /// Display name.
        name: String,
        /// Phone as entered.
        phone: String,
        /// Relationship label; defaults to "Friend".
        relationship: Option<String>,
    },
    /// Remove a contact by row ID.
    Remove {
        /// Row identifier.
        id: String,
    },
}

/// Trusted contact management.
#[derive(Debug, Clone)]
pub struct ContactsCommand {
    user: UserId,
    action: ContactsAction,
}

impl ContactsCommand {
    /// Creates the command.
    #[must_use]
    pub fn new(user: impl Into<String>, action: ContactsAction) -> Self {
        Self {
            user: UserId::new(user),
            action,
        }
    }

    /// Runs the action and renders the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the store request fails, the phone number is
    /// invalid, or the contact to remove does not exist.
    pub fn run(&self, container: &ServiceContainer) -> Result<String> {
        let contacts = container.contacts();
        match &self.action {
            ContactsAction::List => {
                let list = contacts.contacts_for_alert(&self.user)?;
                if list.is_empty() {
                    return Ok(format!("No trusted contacts for {}\n", self.user));
                }
                let mut out = String::new();
                for contact in &list {
                    let _ = writeln!(
                        out,
                        "{:<38} {:<20} {:<16} {}",
                        contact.id.as_deref().unwrap_or("-"),
                        contact.label(),
                        contact.phone,
                        contact.relationship.as_deref().unwrap_or("")
                    );
                }
                Ok(out)
            },
            ContactsAction::Add {
                name,
                phone,
                relationship,
            } => {
                let normalized = crate::messaging::normalize_phone(
                    phone,
                    &container.config().messaging.default_country_code,
                )
                .map_err(|e| Error::InvalidInput(e.to_string()))?;
                let mut new = NewContact::new(&self.user, name, phone);
                if let Some(relationship) = relationship {
                    new = new.with_relationship(relationship.clone());
                }
                let added = contacts.add(&new)?;
                tracing::info!(user_id = %self.user, contact = %added.label(), "Contact added");
                Ok(format!(
                    "Added {} ({normalized}) id={}\n",
                    added.label(),
                    added.id.as_deref().unwrap_or("-")
                ))
            },
            ContactsAction::Remove { id } => {
                if contacts.remove(id)? {
                    tracing::info!(user_id = %self.user, contact_id = %id, "Contact removed");
                    Ok(format!("Removed contact {id}\n"))
                } else {
                    Err(Error::InvalidInput(format!("no contact with id {id}")))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HavenConfig;
    use crate::models::Location;
    use crate::platform::Platform;

    fn container() -> ServiceContainer {
        ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container")
    }

    #[test]
    fn test_add_list_remove() {
        let container = container();
        let add = ContactsCommand::new(
            "u1",
            ContactsAction::Add {
                name: "Asha".to_string(),
                phone: "98765 43210".to_string(),
                relationship: Some("Sister".to_string()),
            },
        );
        let output = add.run(&container).expect("add");
        assert!(output.starts_with("Added Asha (+919876543210)"));

        let listed = ContactsCommand::new("u1", ContactsAction::List)
            .run(&container)
            .expect("list");
        assert!(listed.contains("Asha"));
        assert!(listed.contains("Sister"));

        let id = container.contacts().list(&UserId::new("u1")).expect("list")[0]
            .id
            .clone()
            .expect("id");
        let removed = ContactsCommand::new("u1", ContactsAction::Remove { id })
            .run(&container)
            .expect("remove");
        assert!(removed.starts_with("Removed contact"));

        let empty = ContactsCommand::new("u1", ContactsAction::List)
            .run(&container)
            .expect("list");
        assert_eq!(empty, "No trusted contacts for u1\n");
    }

    #[test]
    fn test_add_rejects_short_phone() {
        let container = container();
        let add = ContactsCommand::new(
            "u1",
            ContactsAction::Add {
                name: "Asha".to_string(),
                phone: "12345".to_string(),
                relationship: None,
            },
        );
        assert!(matches!(add.run(&container), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_remove_unknown_contact() {
        let container = container();
        let remove = ContactsCommand::new(
            "u1",
            ContactsAction::Remove {
                id: "missing".to_string(),
            },
        );
        assert!(remove.run(&container).is_err());
    }
}

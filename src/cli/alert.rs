//! Alert CLI command.

use crate::alerts::{AlertOutcome, SendStatus};
use crate::models::{Location, UserId};
use crate::services::ServiceContainer;
use crate::Result;
use std::fmt::Write as _;

/// Sends one emergency alert for a user at fixed coordinates.
#[derive(Debug, Clone)]
pub struct AlertCommand {
    user: UserId,
    location: Location,
    message: Option<String>,
}

impl AlertCommand {
    /// Creates the command, validating the coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) for
    /// out-of-range coordinates.
    pub fn new(user: impl Into<String>, lat: f64, lng: f64) -> Result<Self> {
        Ok(Self {
            user: UserId::new(user),
            location: Location::checked(lat, lng)?,
            message: None,
        })
    }

    /// Overrides the configured alert text.
    #[must_use]
    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    /// Sends the alert and returns the outcome.
    pub fn execute(&self, container: &ServiceContainer) -> AlertOutcome {
        let message = self
            .message
            .as_deref()
            .unwrap_or(&container.config().emergency.alert_message);
        container
            .dispatcher()
            .send_emergency_alert(&self.user, message, Some(self.location))
    }

    /// Sends the alert and renders the outcome for the terminal.
    pub fn run(&self, container: &ServiceContainer) -> String {
        render_outcome(&self.execute(container))
    }
}

/// Renders an alert outcome, one line per contact.
#[must_use]
pub fn render_outcome(outcome: &AlertOutcome) -> String {
    let mut out = String::new();
    if outcome.success {
        let _ = writeln!(
            out,
            "Alert sent to {} of {} contact(s)",
            outcome.sent_count(),
            outcome.results.len()
        );
    } else {
        let reason = outcome
            .failure
            .as_ref()
            .map_or("unknown failure", |f| f.user_message());
        let _ = writeln!(out, "Alert not sent: {reason}");
    }
    for result in &outcome.results {
        let phone = result.phone.as_deref().unwrap_or(&result.contact.phone);
        match result.status {
            SendStatus::Sent => {
                let sid = result.message_id.as_deref().unwrap_or("-");
                let _ = writeln!(out, "  [sent]   {} <{phone}> sid={sid}", result.contact.label());
            },
            SendStatus::Failed => {
                let error = result.error.as_deref().unwrap_or("unknown error");
                let _ = writeln!(out, "  [failed] {} <{phone}> {error}", result.contact.label());
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HavenConfig;
    use crate::models::NewContact;
    use crate::platform::Platform;

    fn container() -> ServiceContainer {
        ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container")
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        assert!(AlertCommand::new("u1", 91.0, 0.0).is_err());
        assert!(AlertCommand::new("u1", 0.0, -181.0).is_err());
    }

    #[test]
    fn test_alert_without_contacts() {
        let container = container();
        let output = AlertCommand::new("u1", 12.83, 77.65)
            .expect("command")
            .run(&container);
        assert!(output.starts_with("Alert not sent"));
    }

    #[test]
    fn test_alert_lists_each_contact() {
        let container = container();
        let user = UserId::new("u1");
        container
            .contacts()
            .add(&NewContact::new(&user, "Asha", "9876543210"))
            .expect("add");

        let output = AlertCommand::new("u1", 12.83, 77.65)
            .expect("command")
            .with_message(Some("Help".to_string()))
            .run(&container);
        assert!(output.starts_with("Alert sent to 1 of 1 contact(s)"));
        assert!(output.contains("[sent]   Asha <+919876543210>"));
    }
}

//! One-tap actions available outside an SOS session.

use super::calls::{CallResult, CallTrigger};
use super::location::LocationWatcher;
use crate::alerts::{AlertDispatcher, AlertOutcome};
use crate::models::UserId;
use crate::storage::ContactRepository;
use crate::{Error, Result};
use std::time::Duration;

/// Check-in alert and call shortcuts.
#[derive(Clone)]
pub struct QuickActions {
    watcher: LocationWatcher,
    dispatcher: AlertDispatcher,
    contacts: ContactRepository,
    calls: CallTrigger,
    check_in_message: String,
    services_number: String,
    fix_timeout: Duration,
}

impl QuickActions {
    /// Creates the quick action set with the default alert messages and fix
    /// deadline.
    ///
    /// # Arguments
    ///
    /// * `watcher` - Shared watcher used for the check-in location fix
    /// * `dispatcher` - Sends check-in alerts
    /// * `contacts` - Source of the first trusted contact to call
    /// * `calls` - Dialer handoff
    #[must_use]
    pub fn new(
        watcher: LocationWatcher,
        dispatcher: AlertDispatcher,
        contacts: ContactRepository,
        calls: CallTrigger,
    ) -> Self {
        let defaults = crate::config::HavenConfig::default();
        Self {
            watcher,
            dispatcher,
            contacts,
            calls,
            check_in_message: defaults.emergency.check_in_message,
            services_number: defaults.emergency.services_number,
            fix_timeout: defaults.location.quick_fix_timeout,
        }
    }

    /// Overrides message, number and fix deadline.
    #[must_use]
    pub fn with_settings(
        mut self,
        check_in_message: impl Into<String>,
        services_number: impl Into<String>,
        fix_timeout: Duration,
    ) -> Self {
        self.check_in_message = check_in_message.into();
        self.services_number = services_number.into();
        self.fix_timeout = fix_timeout;
        self
    }

    /// Sends the "feeling unsafe" alert with a fresh (or last known) fix.
    pub fn send_check_in_alert(&self, user: &UserId) -> AlertOutcome {
        let fix = self.watcher.current_fix(self.fix_timeout);
        self.dispatcher
            .send_emergency_alert(user, &self.check_in_message, fix.map(|s| s.location))
    }

    /// Calls the user's first trusted contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the contacts cannot be read or there are none.
    pub fn call_trusted_contact(&self, user: &UserId) -> Result<CallResult> {
        let contact = self
            .contacts
            .first(user)?
            .ok_or_else(|| Error::InvalidInput("no trusted contacts to call".to_string()))?;
        tracing::info!(contact = %contact.label(), "Calling trusted contact");
        Ok(self.calls.call(&contact.phone))
    }

    /// Calls the configured emergency services number.
    #[must_use]
    pub fn call_emergency_services(&self) -> CallResult {
        self.calls.call(&self.services_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::{MockSms, SmsProvider};
    use crate::models::{Location, NewContact};
    use crate::platform::{StaticGeolocation, SystemTelephony};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn actions(geo: StaticGeolocation, sms: &Arc<MockSms>) -> (QuickActions, ContactRepository) {
        let contacts = ContactRepository::new(Arc::new(MemoryStore::new()));
        let sms: Arc<dyn SmsProvider> = sms.clone();
        let actions = QuickActions::new(
            LocationWatcher::new(Arc::new(geo)),
            AlertDispatcher::new(contacts.clone(), Some(sms)),
            contacts.clone(),
            CallTrigger::new(Arc::new(SystemTelephony::dry_run())),
        );
        (actions, contacts)
    }

    #[test]
    fn test_check_in_alert_uses_check_in_message() {
        let sms = Arc::new(MockSms::new());
        let (actions, contacts) = actions(StaticGeolocation::fixed(Location::new(1.5, 2.5)), &sms);
        let user = UserId::new("u1");
        contacts
            .add(&NewContact::new(&user, "Asha", "9876543210"))
            .expect("add");

        let outcome = actions.send_check_in_alert(&user);
        assert!(outcome.success);
        let sent = sms.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.starts_with("I'm feeling unsafe"));
        assert!(sent[0].body.ends_with("?q=1.5,2.5"));
    }

    #[test]
    fn test_check_in_without_location_sends_nothing() {
        let sms = Arc::new(MockSms::new());
        let (actions, contacts) = actions(StaticGeolocation::denied(), &sms);
        let user = UserId::new("u1");
        contacts
            .add(&NewContact::new(&user, "Asha", "9876543210"))
            .expect("add");

        assert!(actions.send_check_in_alert(&user).skipped());
        assert_eq!(sms.attempts(), 0);
    }

    #[test]
    fn test_call_shortcuts() {
        let sms = Arc::new(MockSms::new());
        let (actions, contacts) = actions(StaticGeolocation::denied(), &sms);
        let user = UserId::new("u1");

        assert!(actions.call_trusted_contact(&user).is_err());
        contacts
            .add(&NewContact::new(&user, "Asha", "98765 43210"))
            .expect("add");
        let result = actions.call_trusted_contact(&user).expect("call");
        assert_eq!(result.uri, "tel:9876543210");

        assert_eq!(actions.call_emergency_services().uri, "tel:112");
    }
}

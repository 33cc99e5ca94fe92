//! Emergency alert dispatch.
//!
//! The dispatcher fans one alert out to every trusted contact of a user and
//! aggregates the per-contact results.
//!
//! # Flow
//!
//! ```text
//! location? ──none──> skipped (no network)
//!     │
//! provider? ──none──> NotConfigured
//!     │
//! contacts (trusted_contacts, else legacy contacts) ──err──> ContactLookup
//!     │                                             ──empty─> NoContacts
//!     v
//! normalize each phone ──> send concurrently ──> AlertOutcome
//! ```
//!
//! One contact failing never aborts the others; the alert succeeds when at
//! least one message was accepted.

mod throttle;

pub use throttle::AlertThrottle;

use crate::messaging::{SmsProvider, normalize_phone};
use crate::models::{Contact, Location, UserId};
use crate::storage::ContactRepository;
use std::sync::Arc;
use std::time::Instant;

/// Delivery state of one contact's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The provider accepted the message.
    Sent,
    /// Normalization or delivery failed.
    Failed,
}

impl SendStatus {
    /// Returns the status as a metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

/// Result for a single contact.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactResult {
    /// The contact as read from the store.
    pub contact: Contact,
    /// Normalized number, when normalization succeeded.
    pub phone: Option<String>,
    /// Outcome.
    pub status: SendStatus,
    /// Provider message ID on success.
    pub message_id: Option<String>,
    /// Failure description.
    pub error: Option<String>,
}

/// Why an alert as a whole did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertFailure {
    /// No location was available; nothing was sent.
    NoLocation,
    /// No SMS provider is configured.
    NotConfigured,
    /// The contacts could not be read.
    ContactLookup(String),
    /// The user has no contacts.
    NoContacts,
    /// Every per-contact send failed.
    AllSendsFailed,
}

impl AlertFailure {
    /// Text suitable for showing to the user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NoLocation => "Location unavailable, alert not sent",
            Self::NotConfigured => "Messaging is not configured",
            Self::ContactLookup(_) => "Failed to fetch contacts",
            Self::NoContacts => "No emergency contacts found",
            Self::AllSendsFailed => "Failed to send alerts to any contact",
        }
    }
}

impl std::fmt::Display for AlertFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactLookup(cause) => write!(f, "{}: {cause}", self.user_message()),
            _ => f.write_str(self.user_message()),
        }
    }
}

/// Aggregate result of one alert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertOutcome {
    /// True iff at least one contact was sent the message.
    pub success: bool,
    /// Reason when `success` is false.
    pub failure: Option<AlertFailure>,
    /// One entry per contact, in contact order.
    pub results: Vec<ContactResult>,
}

impl AlertOutcome {
    fn failed(failure: AlertFailure) -> Self {
        Self {
            success: false,
            failure: Some(failure),
            results: Vec::new(),
        }
    }

    /// Number of contacts that were sent the message.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == SendStatus::Sent)
            .count()
    }

    /// True when the alert was skipped for lack of a location.
    #[must_use]
    pub fn skipped(&self) -> bool {
        self.failure == Some(AlertFailure::NoLocation)
    }
}

/// Sends emergency alerts to a user's trusted contacts.
#[derive(Clone)]
pub struct AlertDispatcher {
    contacts: ContactRepository,
    sms: Option<Arc<dyn SmsProvider>>,
    country_code: String,
    maps_base_url: String,
}

impl AlertDispatcher {
    /// Creates a new alert dispatcher.
    ///
    /// Map links use the Google Maps base URL until overridden.
    ///
    /// # Arguments
    ///
    /// * `contacts` - Repository the recipients are read from on every send
    /// * `sms` - SMS provider; `None` makes every alert fail as not configured
    #[must_use]
    pub fn new(contacts: ContactRepository, sms: Option<Arc<dyn SmsProvider>>) -> Self {
        Self {
            contacts,
            sms,
            country_code: "91".to_string(),
            maps_base_url: crate::models::DEFAULT_MAPS_BASE_URL.to_string(),
        }
    }

    /// Sets the country code prepended to 10-digit numbers.
    #[must_use]
    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    /// Sets the base URL of the map link.
    #[must_use]
    pub fn with_maps_base_url(mut self, url: impl Into<String>) -> Self {
        self.maps_base_url = url.into();
        self
    }

    /// Composes the SMS body: the message followed by a map link.
    #[must_use]
    pub fn compose(&self, message: &str, location: Location) -> String {
        format!("{message} {}", location.maps_link(&self.maps_base_url))
    }

    /// Sends `message` with a map link to every contact of `user`.
    ///
    /// Never returns an error; every failure is reported in the outcome.
    pub fn send_emergency_alert(
        &self,
        user: &UserId,
        message: &str,
        location: Option<Location>,
    ) -> AlertOutcome {
        let start = Instant::now();
        let outcome = self.dispatch(user, message, location);

        let label = match &outcome.failure {
            None => "success",
            Some(AlertFailure::NoLocation) => "skipped",
            Some(_) => "failure",
        };
        metrics::counter!("haven_alerts_total", "outcome" => label).increment(1);
        metrics::histogram!("haven_alert_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match &outcome.failure {
            None => tracing::info!(
                user_id = %user,
                sent = outcome.sent_count(),
                contacts = outcome.results.len(),
                "Emergency alert sent"
            ),
            Some(AlertFailure::NoLocation) => {
                tracing::warn!(user_id = %user, "No location available, alert skipped");
            },
            Some(failure) => tracing::warn!(
                user_id = %user,
                failure = %failure,
                contacts = outcome.results.len(),
                "Emergency alert failed"
            ),
        }
        outcome
    }

    fn dispatch(&self, user: &UserId, message: &str, location: Option<Location>) -> AlertOutcome {
        let Some(location) = location else {
            return AlertOutcome::failed(AlertFailure::NoLocation);
        };
        let Some(sms) = self.sms.as_deref() else {
            return AlertOutcome::failed(AlertFailure::NotConfigured);
        };

        let contacts = match self.contacts.contacts_for_alert(user) {
            Ok(contacts) => contacts,
            Err(e) => return AlertOutcome::failed(AlertFailure::ContactLookup(e.to_string())),
        };
        if contacts.is_empty() {
            return AlertOutcome::failed(AlertFailure::NoContacts);
        }

        let body = self.compose(message, location);
        let results = self.send_all(sms, contacts, &body);
        let success = results.iter().any(|r| r.status == SendStatus::Sent);

        AlertOutcome {
            success,
            failure: (!success).then_some(AlertFailure::AllSendsFailed),
            results,
        }
    }

    /// Sends to every contact concurrently, preserving contact order.
    fn send_all(
        &self,
        sms: &dyn SmsProvider,
        contacts: Vec<Contact>,
        body: &str,
    ) -> Vec<ContactResult> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = contacts
                .into_iter()
                .map(|contact| {
                    let fallback = contact.clone();
                    let handle = scope.spawn(move || self.send_one(sms, contact, body));
                    (fallback, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(fallback, handle)| {
                    handle.join().unwrap_or_else(|_| ContactResult {
                        contact: fallback,
                        phone: None,
                        status: SendStatus::Failed,
                        message_id: None,
                        error: Some("send task panicked".to_string()),
                    })
                })
                .collect()
        })
    }

    fn send_one(&self, sms: &dyn SmsProvider, contact: Contact, body: &str) -> ContactResult {
        let phone = match normalize_phone(&contact.phone, &self.country_code) {
            Ok(phone) => phone,
            Err(e) => {
                metrics::counter!("haven_alert_sends_total", "status" => "invalid").increment(1);
                tracing::warn!(contact = %contact.label(), error = %e, "Skipping contact");
                return ContactResult {
                    contact,
                    phone: None,
                    status: SendStatus::Failed,
                    message_id: None,
                    error: Some(e.to_string()),
                };
            },
        };

        let (status, message_id, error) = match sms.send(&phone, body) {
            Ok(receipt) => {
                tracing::debug!(contact = %contact.label(), sid = %receipt.sid, "Alert delivered");
                (SendStatus::Sent, Some(receipt.sid), None)
            },
            Err(e) => {
                tracing::warn!(contact = %contact.label(), error = %e, "Alert delivery failed");
                (SendStatus::Failed, None, Some(e.to_string()))
            },
        };
        metrics::counter!(
            "haven_alert_sends_total",
            "status" => status.as_str(),
            "provider" => sms.name()
        )
        .increment(1);

        ContactResult {
            contact,
            phone: Some(phone),
            status,
            message_id,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MockSms;
    use crate::storage::{CONTACTS_TABLE, LEGACY_CONTACTS_TABLE, MemoryStore, RemoteStore};
    use serde_json::json;

    const MESSAGE: &str = "EMERGENCY ALERT: I need help!";

    fn store_with(phones: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (i, phone) in phones.iter().enumerate() {
            let row = crate::storage::to_row(
                &json!({"user_id": "u1", "name": format!("C{i}"), "phone": phone}),
            )
            .expect("row");
            store.insert(CONTACTS_TABLE, vec![row]).expect("seed");
        }
        store
    }

    fn dispatcher(store: Arc<MemoryStore>, sms: &Arc<MockSms>) -> AlertDispatcher {
        let sms: Arc<dyn SmsProvider> = sms.clone();
        AlertDispatcher::new(ContactRepository::new(store), Some(sms))
    }

    #[test]
    fn test_sends_to_every_contact() {
        let sms = Arc::new(MockSms::new());
        let d = dispatcher(store_with(&["9876543210", "+1 415 555 0100"]), &sms);

        let outcome = d.send_emergency_alert(
            &UserId::new("u1"),
            MESSAGE,
            Some(Location::new(12.83, 77.65)),
        );

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].phone.as_deref(), Some("+919876543210"));
        assert_eq!(outcome.results[1].phone.as_deref(), Some("+14155550100"));
        let sent = sms.sent();
        assert_eq!(sent.len(), 2);
        assert!(
            sent.iter()
                .all(|m| m.body == format!("{MESSAGE} https://www.google.com/maps?q=12.83,77.65"))
        );
    }

    #[test]
    fn test_no_location_makes_no_calls() {
        let store = store_with(&["9876543210"]);
        let sms = Arc::new(MockSms::new());
        let d = dispatcher(Arc::clone(&store), &sms);

        let outcome = d.send_emergency_alert(&UserId::new("u1"), MESSAGE, None);
        assert!(outcome.skipped());
        assert!(!outcome.success);
        assert_eq!(sms.attempts(), 0);
        assert_eq!(store.select_count(), 0);
    }

    #[test]
    fn test_no_contacts() {
        let sms = Arc::new(MockSms::new());
        let d = dispatcher(store_with(&[]), &sms);
        let outcome =
            d.send_emergency_alert(&UserId::new("u1"), MESSAGE, Some(Location::new(1.0, 2.0)));
        assert_eq!(outcome.failure, Some(AlertFailure::NoContacts));
        assert_eq!(
            outcome.failure.as_ref().map(AlertFailure::user_message),
            Some("No emergency contacts found")
        );
        assert_eq!(sms.attempts(), 0);
    }

    #[test]
    fn test_contact_lookup_failure() {
        let store = Arc::new(
            MemoryStore::new()
                .with_failing_table(CONTACTS_TABLE)
                .with_failing_table(LEGACY_CONTACTS_TABLE),
        );
        let sms = Arc::new(MockSms::new());
        let d = dispatcher(store, &sms);
        let outcome =
            d.send_emergency_alert(&UserId::new("u1"), MESSAGE, Some(Location::new(1.0, 2.0)));
        assert!(matches!(outcome.failure, Some(AlertFailure::ContactLookup(_))));
        assert_eq!(sms.attempts(), 0);
    }

    #[test]
    fn test_unconfigured_provider() {
        let d = AlertDispatcher::new(ContactRepository::new(store_with(&["9876543210"])), None);
        let outcome =
            d.send_emergency_alert(&UserId::new("u1"), MESSAGE, Some(Location::new(1.0, 2.0)));
        assert_eq!(outcome.failure, Some(AlertFailure::NotConfigured));
    }

    #[test]
    fn test_partial_failure_still_succeeds() {
        let sms = Arc::new(MockSms::new().failing_for("+919876543210"));
        let d = dispatcher(store_with(&["9876543210", "12345", "+14155550100"]), &sms);

        let outcome =
            d.send_emergency_alert(&UserId::new("u1"), MESSAGE, Some(Location::new(1.0, 2.0)));

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 3);
        let statuses: Vec<_> = outcome.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![SendStatus::Failed, SendStatus::Failed, SendStatus::Sent]
        );
        assert!(outcome.results[1].phone.is_none());
        assert!(outcome.results[1].error.is_some());
        assert_eq!(sms.attempts(), 2);
    }

    #[test]
    fn test_all_failed() {
        let sms = Arc::new(MockSms::new().failing_for("+919876543210"));
        let d = dispatcher(store_with(&["9876543210"]), &sms);
        let outcome =
            d.send_emergency_alert(&UserId::new("u1"), MESSAGE, Some(Location::new(1.0, 2.0)));
        assert!(!outcome.success);
        assert_eq!(outcome.failure, Some(AlertFailure::AllSendsFailed));
        assert_eq!(outcome.results.len(), 1);
    }
}

//! Integration tests for alert dispatch against the in-memory store.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use haven::alerts::{AlertDispatcher, AlertFailure, SendStatus};
use haven::messaging::{MockSms, SmsProvider};
use haven::models::{Location, NewContact, UserId};
use haven::storage::{ContactRepository, MemoryStore, RemoteStore};
use serde_json::json;
use std::sync::Arc;

const MESSAGE: &str = "EMERGENCY ALERT: I need help! This is my current location:";

fn setup() -> (Arc<MemoryStore>, ContactRepository, Arc<MockSms>) {
    let store = Arc::new(MemoryStore::new());
    let contacts = ContactRepository::new(store.clone());
    (store, contacts, Arc::new(MockSms::new()))
}

fn dispatcher(contacts: &ContactRepository, sms: &Arc<MockSms>) -> AlertDispatcher {
    let provider: Arc<dyn SmsProvider> = sms.clone();
    AlertDispatcher::new(contacts.clone(), Some(provider))
}

#[test]
fn test_two_contacts_receive_map_link() {
    let (_store, contacts, sms) = setup();
    let user = UserId::new("user-1");
    contacts
        .add(&NewContact::new(&user, "Asha", "9876543210"))
        .expect("add");
    contacts
        .add(&NewContact::new(&user, "Ravi", "+1 (415) 555-0100"))
        .expect("add");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(12.83, 77.65)),
    );

    assert!(outcome.success);
    assert_eq!(outcome.sent_count(), 2);
    let sent = sms.sent();
    assert_eq!(sent.len(), 2);
    for message in &sent {
        assert_eq!(
            message.body,
            format!("{MESSAGE} https://www.google.com/maps?q=12.83,77.65")
        );
    }
    let mut recipients: Vec<_> = sent.iter().map(|m| m.to.clone()).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["+14155550100", "+919876543210"]);
}

#[test]
fn test_missing_location_sends_nothing() {
    let (_store, contacts, sms) = setup();
    let user = UserId::new("user-1");
    contacts
        .add(&NewContact::new(&user, "Asha", "9876543210"))
        .expect("add");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(&user, MESSAGE, None);

    assert!(!outcome.success);
    assert!(outcome.skipped());
    assert!(outcome.results.is_empty());
    assert_eq!(sms.attempts(), 0);
}

#[test]
fn test_no_contacts_is_distinct_from_send_failure() {
    let (_store, contacts, sms) = setup();
    let user = UserId::new("user-1");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(12.83, 77.65)),
    );

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(AlertFailure::NoContacts));
    assert_eq!(
        outcome.failure.as_ref().map(AlertFailure::user_message),
        Some("No emergency contacts found")
    );
    assert_eq!(sms.attempts(), 0);
}

#[test]
fn test_partial_failure_still_succeeds() {
    let (_store, contacts, _) = setup();
    let sms = Arc::new(MockSms::new().failing_for("+919876543210"));
    let user = UserId::new("user-1");
    contacts
        .add(&NewContact::new(&user, "Asha", "9876543210"))
        .expect("add");
    contacts
        .add(&NewContact::new(&user, "Ravi", "9123456780"))
        .expect("add");
    contacts
        .add(&NewContact::new(&user, "Short", "12345"))
        .expect("add");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(12.83, 77.65)),
    );

    assert!(outcome.success);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.sent_count(), 1);
    let failed: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| r.status == SendStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|r| r.error.is_some()));
}

#[test]
fn test_all_sends_failing() {
    let (_store, contacts, _) = setup();
    let sms = Arc::new(MockSms::new().failing_for("+919876543210"));
    let user = UserId::new("user-1");
    contacts
        .add(&NewContact::new(&user, "Asha", "9876543210"))
        .expect("add");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(12.83, 77.65)),
    );

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(AlertFailure::AllSendsFailed));
}

#[test]
fn test_legacy_contacts_table_is_used_as_fallback() {
    let (store, contacts, sms) = setup();
    let user = UserId::new("user-1");
    let row = json!({ "user_id": "user-1", "phone": "9876543210" });
    store
        .insert("contacts", vec![row.as_object().cloned().expect("object")])
        .expect("insert legacy row");

    let outcome = dispatcher(&contacts, &sms).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(1.0, 2.0)),
    );

    assert!(outcome.success);
    assert_eq!(sms.sent()[0].to, "+919876543210");
}

#[test]
fn test_unconfigured_provider() {
    let (_store, contacts, _) = setup();
    let user = UserId::new("user-1");
    contacts
        .add(&NewContact::new(&user, "Asha", "9876543210"))
        .expect("add");

    let outcome = AlertDispatcher::new(contacts, None).send_emergency_alert(
        &user,
        MESSAGE,
        Some(Location::new(1.0, 2.0)),
    );

    assert_eq!(outcome.failure, Some(AlertFailure::NotConfigured));
}

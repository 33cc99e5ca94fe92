//! Property-based tests for phone normalization, map links and alert fan-out.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Ten-digit numbers always get the default country code
//! - Formatting characters never change the result
//! - Normalization is idempotent
//! - Short numbers are always rejected
//! - An alert succeeds exactly when at least one contact was reached

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use haven::alerts::{AlertDispatcher, AlertFailure, AlertOutcome, SendStatus};
use haven::messaging::{MockSms, PhoneError, SmsProvider, normalize_phone};
use haven::models::{Location, NewContact, UserId};
use haven::storage::{ContactRepository, MemoryStore};
use proptest::prelude::*;
use std::sync::Arc;

/// Sends one alert to `contacts`, failing the numbers flagged `true`.
fn alert_with_failures(contacts: &[(String, bool)]) -> (AlertOutcome, Arc<MockSms>) {
    let user = UserId::new("user-1");
    let repo = ContactRepository::new(Arc::new(MemoryStore::new()));
    let mut sms = MockSms::new();
    for (i, (phone, fails)) in contacts.iter().enumerate() {
        repo.add(&NewContact::new(&user, &format!("Contact {i}"), phone))
            .expect("add contact");
        if *fails {
            sms = sms.failing_for(format!("+91{phone}"));
        }
    }
    let sms = Arc::new(sms);
    let provider: Arc<dyn SmsProvider> = sms.clone();
    let outcome = AlertDispatcher::new(repo, Some(provider)).send_emergency_alert(
        &user,
        "Help",
        Some(Location::new(12.83, 77.65)),
    );
    (outcome, sms)
}

proptest! {
    /// Property: exactly ten digits become `+{cc}{digits}`.
    #[test]
    fn prop_ten_digits_get_country_code(
        digits in "[0-9]{10}",
        cc in "[1-9][0-9]{0,2}",
    ) {
        let normalized = normalize_phone(&digits, &cc).expect("ten digits");
        prop_assert_eq!(normalized, format!("+{cc}{digits}"));
    }

    /// Property: more than ten digits are kept as-is behind a `+`.
    #[test]
    fn prop_long_numbers_keep_their_digits(digits in "[0-9]{11,15}") {
        let normalized = normalize_phone(&digits, "91").expect("long number");
        prop_assert_eq!(normalized, format!("+{digits}"));
    }

    /// Property: spaces, dashes and parentheses are ignored.
    #[test]
    fn prop_formatting_is_ignored(
        digits in "[0-9]{10}",
        separators in prop::collection::vec(prop::sample::select(vec![" ", "-", "(", ")", "."]), 10),
    ) {
        let formatted: String = digits
            .chars()
            .zip(separators.iter())
            .map(|(d, sep)| format!("{d}{sep}"))
            .collect();
        prop_assert_eq!(
            normalize_phone(&formatted, "91").expect("formatted"),
            normalize_phone(&digits, "91").expect("bare")
        );
    }

    /// Property: normalizing a normalized number changes nothing.
    #[test]
    fn prop_normalization_is_idempotent(digits in "[0-9]{10,15}") {
        let once = normalize_phone(&digits, "91").expect("first pass");
        let twice = normalize_phone(&once, "91").expect("second pass");
        prop_assert_eq!(once, twice);
    }

    /// Property: fewer than ten digits are rejected with the digit count.
    #[test]
    fn prop_short_numbers_rejected(digits in "[0-9]{0,9}") {
        let result = normalize_phone(&digits, "91");
        let expected = digits.len();
        let rejected_with_count =
            matches!(result, Err(PhoneError::TooShort { digits, .. }) if digits == expected);
        prop_assert!(rejected_with_count);
    }

    /// Property: valid coordinates always produce a `?q=lat,lng` link.
    #[test]
    fn prop_maps_link_carries_coordinates(lat in -90.0f64..=90.0, lng in -180.0f64..=180.0) {
        let location = Location::checked(lat, lng).expect("in range");
        let link = location.maps_link("https://www.google.com/maps/");
        prop_assert_eq!(link, format!("https://www.google.com/maps?q={lat},{lng}"));
    }

    /// Property: latitudes beyond the poles are rejected.
    #[test]
    fn prop_out_of_range_latitude_rejected(lat in 90.0001f64..1000.0) {
        prop_assert!(Location::checked(lat, 0.0).is_err());
        prop_assert!(Location::checked(-lat, 0.0).is_err());
    }

    /// Property: one result per contact, and success iff any send went out.
    #[test]
    fn prop_alert_success_iff_any_contact_reached(
        contacts in prop::collection::vec(("[2-9][0-9]{9}", any::<bool>()), 1..6),
    ) {
        // A number shared by two contacts fails for both if either flag is set.
        let failing: Vec<&str> = contacts
            .iter()
            .filter(|(_, fails)| *fails)
            .map(|(phone, _)| phone.as_str())
            .collect();
        let reachable = contacts
            .iter()
            .filter(|(phone, _)| !failing.contains(&phone.as_str()))
            .count();

        let (outcome, sms) = alert_with_failures(&contacts);

        prop_assert_eq!(outcome.results.len(), contacts.len());
        prop_assert_eq!(outcome.sent_count(), reachable);
        prop_assert_eq!(sms.sent().len(), reachable);
        prop_assert_eq!(outcome.success, reachable > 0);
        prop_assert_eq!(
            outcome.results.iter().filter(|r| r.status == SendStatus::Failed).count(),
            contacts.len() - reachable
        );
        if reachable == 0 {
            prop_assert_eq!(outcome.failure, Some(AlertFailure::AllSendsFailed));
        } else {
            prop_assert!(outcome.failure.is_none());
        }
    }
}

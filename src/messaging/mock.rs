//! Logging SMS provider for development and tests.

use super::{MessageReceipt, SmsProvider};
use crate::{Error, Result, current_timestamp_millis};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// A message accepted by [`MockSms`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Recipient.
    pub to: String,
    /// Body.
    pub body: String,
}

/// Logs messages instead of sending them.
///
/// Every send is recorded so tests can inspect what would have gone out.
/// Individual recipients can be made to fail.
#[derive(Debug, Default)]
pub struct MockSms {
    sent: Mutex<Vec<SentMessage>>,
    failing: HashSet<String>,
}

impl MockSms {
    /// Creates a provider that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects messages to `number` (E.164).
    #[must_use]
    pub fn failing_for(mut self, number: impl Into<String>) -> Self {
        self.failing.insert(number.into());
        self
    }

    /// Messages sent so far, including rejected attempts.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of send attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SmsProvider for MockSms {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn send(&self, to: &str, body: &str) -> Result<MessageReceipt> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                to: to.to_string(),
                body: body.to_string(),
            });

        if self.failing.contains(to) {
            return Err(Error::operation("sms_send", "mock provider rejected recipient"));
        }

        tracing::info!(provider = "mock", to = %to, body = %body, "SMS not sent (mock provider)");
        Ok(MessageReceipt {
            sid: format!("mock-sid-{}", current_timestamp_millis()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_returns_sid() {
        let sms = MockSms::new();
        let receipt = sms.send("+919876543210", "help").expect("send");
        assert!(receipt.sid.starts_with("mock-sid-"));
        assert_eq!(
            sms.sent(),
            vec![SentMessage {
                to: "+919876543210".to_string(),
                body: "help".to_string()
            }]
        );
    }

    #[test]
    fn test_failing_recipient() {
        let sms = MockSms::new().failing_for("+10000000000");
        assert!(sms.send("+10000000000", "help").is_err());
        assert!(sms.send("+919876543210", "help").is_ok());
        assert_eq!(sms.attempts(), 2);
    }
}

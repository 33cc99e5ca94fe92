//! SMS delivery.
//!
//! Alerts are delivered through an [`SmsProvider`]. Two implementations are
//! selected by configuration:
//!
//! | Provider | Type | Behaviour |
//! |----------|------|-----------|
//! | `twilio` | [`TwilioSms`] | Twilio Messages REST API |
//! | `mock` | [`MockSms`] | Logs the message and returns a synthetic SID |

mod mock;
mod phone;
mod twilio;

pub use mock::{MockSms, SentMessage};
pub use phone::{PhoneError, normalize_phone};
pub use twilio::TwilioSms;

use crate::Result;
use crate::config::{MessagingConfig, SmsBackend};
use std::sync::Arc;

/// Provider acknowledgement for one accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReceipt {
    /// Provider message identifier.
    pub sid: String,
}

/// Trait for SMS providers.
pub trait SmsProvider: Send + Sync {
    /// Returns the provider name.
    fn name(&self) -> &'static str;

    /// Sends `body` to `to` (E.164).
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the message or is unreachable.
    fn send(&self, to: &str, body: &str) -> Result<MessageReceipt>;
}

/// Builds the configured provider.
///
/// Returns `None` when Twilio is selected but its credentials are
/// incomplete; alerts then fail as not configured.
#[must_use]
pub fn provider_from_config(config: &MessagingConfig) -> Option<Arc<dyn SmsProvider>> {
    match config.provider {
        SmsBackend::Mock => Some(Arc::new(MockSms::new())),
        SmsBackend::Twilio => match TwilioSms::from_config(config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Twilio selected but not configured");
                None
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_mock_is_default() {
        let provider = provider_from_config(&MessagingConfig::default()).expect("provider");
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_twilio_without_credentials_is_unconfigured() {
        let config = MessagingConfig {
            provider: SmsBackend::Twilio,
            ..MessagingConfig::default()
        };
        assert!(provider_from_config(&config).is_none());
    }

    #[test]
    fn test_twilio_with_credentials() {
        let config = MessagingConfig {
            provider: SmsBackend::Twilio,
            account_sid: Some("AC123".to_string()),
            auth_token: Some(SecretString::from("token".to_string())),
            from_number: Some("+15550001111".to_string()),
            ..MessagingConfig::default()
        };
        let provider = provider_from_config(&config).expect("provider");
        assert_eq!(provider.name(), "twilio");
    }
}

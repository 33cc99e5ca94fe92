//! Direct-call trigger.

use crate::platform::{Telephony, tel_uri};
use std::sync::Arc;

/// Outcome of a call handoff. `success` only means the dialer was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    /// Whether the handoff was issued.
    pub success: bool,
    /// The `tel:` URI handed to the dialer.
    pub uri: String,
    /// Failure description.
    pub error: Option<String>,
}

/// Hands phone numbers to the platform dialer.
#[derive(Clone)]
pub struct CallTrigger {
    telephony: Arc<dyn Telephony>,
}

impl CallTrigger {
    /// Creates a call trigger that hands numbers to `telephony` as `tel:`
    /// links.
    #[must_use]
    pub fn new(telephony: Arc<dyn Telephony>) -> Self {
        Self { telephony }
    }

    /// Issues a `tel:` handoff for `number`. Never waits for the call.
    pub fn call(&self, number: &str) -> CallResult {
        let uri = tel_uri(number);
        if uri == "tel:" {
            tracing::warn!(number = %number, "Refusing to dial an empty number");
            return CallResult {
                success: false,
                uri,
                error: Some("no dialable digits".to_string()),
            };
        }

        match self.telephony.dial(&uri) {
            Ok(()) => {
                metrics::counter!("haven_calls_total", "result" => "ok").increment(1);
                tracing::info!(uri = %uri, "Emergency call handed off");
                CallResult {
                    success: true,
                    uri,
                    error: None,
                }
            },
            Err(e) => {
                metrics::counter!("haven_calls_total", "result" => "error").increment(1);
                tracing::error!(uri = %uri, error = %e, "Call handoff failed");
                CallResult {
                    success: false,
                    uri,
                    error: Some(e.to_string()),
                }
            },
        }
    }
}

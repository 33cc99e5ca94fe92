//! # Haven
//!
//! Emergency session core for a personal safety application.
//!
//! Haven coordinates what happens when a user presses the SOS control:
//! live location is watched, audio/video is recorded, trusted contacts are
//! alerted by SMS with a map link, and an emergency number can be dialled.
//!
//! ## Features
//!
//! - Session controller with an explicit, awaitable task set per transition
//! - Shared, reference-counted location watcher (observer pattern)
//! - Recording service with chunk buffering and a duration ceiling
//! - Alert dispatcher with concurrent per-contact sends and result aggregation
//! - Pluggable backends: Supabase or in-memory row store, Twilio or mock SMS
//!
//! ## Example
//!
//! ```rust,ignore
//! use haven::{HavenConfig, services::ServiceContainer, models::UserId};
//!
//! let container = ServiceContainer::from_config(&HavenConfig::load_default(), platform)?;
//! let controller = container.session_controller()?;
//! if let Some(tasks) = controller.activate(Some(UserId::new("user-1"))) {
//!     let report = tasks.join().await;
//!     tracing::info!(alert_sent = report.alert_succeeded(), "SOS active");
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod alerts;
pub mod cli;
pub mod config;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod platform;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use alerts::{AlertDispatcher, AlertFailure, AlertOutcome, ContactResult, SendStatus};
pub use config::HavenConfig;
pub use messaging::SmsProvider;
pub use models::{Contact, Location, LocationSample, MediaBlob, UserId};
pub use services::{
    LocationWatcher, RecordingArchiver, RecordingService, ServiceContainer, SessionController,
};
pub use storage::RemoteStore;

/// Error type for haven operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed phone numbers, unknown config values, bad coordinates |
/// | `OperationFailed` | Row store or SMS API requests fail, file I/O fails |
/// | `NotConfigured` | A backend is selected but its credentials are missing |
/// | `PermissionDenied` | Camera, microphone or location permission refused |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - A Supabase REST or storage request fails or returns non-2xx
    /// - The SMS provider rejects a message
    /// - Writing a recording to the download directory fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A collaborator is selected but not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// The platform refused access to a device capability.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl Error {
    /// Shorthand for an [`Error::OperationFailed`].
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for haven operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("bad phone".to_string());
        assert_eq!(err.to_string(), "invalid input: bad phone");

        let err = Error::operation("sms_send", "HTTP 401");
        assert_eq!(err.to_string(), "operation 'sms_send' failed: HTTP 401");

        let err = Error::PermissionDenied("camera".to_string());
        assert_eq!(err.to_string(), "permission denied: camera");

        let err = Error::NotConfigured("store.url".to_string());
        assert_eq!(err.to_string(), "not configured: store.url");
    }

    #[test]
    fn test_current_timestamp_is_recent() {
        // 2020-01-01 in millis
        assert!(current_timestamp_millis() > 1_577_836_800_000);
    }
}

//! Platform geolocation contract.

use crate::models::{LocationError, LocationSample};
use std::time::Duration;

/// Options for a position request or watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask for GPS-grade accuracy.
    pub high_accuracy: bool,
    /// Oldest cached fix the platform may return. Zero forces a fresh fix.
    pub max_staleness: Duration,
    /// Deadline for each fix.
    pub timeout: Duration,
}

impl PositionOptions {
    /// Emergency watch: fresh fixes only, 10 s per fix.
    pub const EMERGENCY: Self = Self {
        high_accuracy: true,
        max_staleness: Duration::ZERO,
        timeout: Duration::from_secs(10),
    };

    /// Everyday watch: accept fixes up to 5 s old.
    pub const STANDARD: Self = Self {
        high_accuracy: true,
        max_staleness: Duration::from_secs(5),
        timeout: Duration::from_secs(10),
    };

    /// One-shot fresh fix with the given deadline.
    #[must_use]
    pub const fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            max_staleness: Duration::ZERO,
            timeout,
        }
    }
}

/// Handle returned by [`GeolocationProvider::watch_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Callback invoked for every fix or error of a watch.
pub type FixCallback = Box<dyn Fn(Result<LocationSample, LocationError>) + Send + Sync>;

/// Continuous and one-shot position reporting.
pub trait GeolocationProvider: Send + Sync {
    /// Returns a single fix, blocking for at most `options.timeout`.
    fn current_position(&self, options: &PositionOptions)
    -> Result<LocationSample, LocationError>;

    /// Starts a continuous subscription. Fixes arrive in platform order.
    fn watch_position(
        &self,
        options: &PositionOptions,
        on_fix: FixCallback,
    ) -> Result<WatchId, LocationError>;

    /// Cancels a subscription. Unknown IDs are ignored.
    fn clear_watch(&self, id: WatchId);
}

//! Shared location watcher.
//!
//! One platform watch serves every interested component. The first
//! subscription opens the watch, the last one to drop closes it, and fixes
//! are broadcast to all subscribers.
//!
//! ```text
//! GeolocationProvider ──fix──> broadcast::Sender ──> LocationSubscription (SOS)
//!                         │                     └──> LocationSubscription (map)
//!                         └──> last known sample
//! ```
//!
//! The platform watch runs with the strictest options any subscriber asked
//! for: an emergency subscriber forces fresh fixes only.

use crate::models::{LocationError, LocationSample};
use crate::platform::{GeolocationProvider, PositionOptions, WatchId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

const FIX_CHANNEL_CAPACITY: usize = 64;

/// A fix or a platform error, as delivered to subscribers.
pub type LocationFix = Result<LocationSample, LocationError>;

/// How fresh a subscriber needs its fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchMode {
    /// Fresh fixes only (SOS sessions).
    Emergency,
    /// Cached fixes within the standard window are fine.
    Standard,
}

/// Timing used to build platform watch options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherTimings {
    /// Deadline per platform fix.
    pub watch_timeout: Duration,
    /// Cache window for standard subscribers.
    pub standard_max_staleness: Duration,
}

impl Default for WatcherTimings {
    fn default() -> Self {
        Self {
            watch_timeout: PositionOptions::EMERGENCY.timeout,
            standard_max_staleness: PositionOptions::STANDARD.max_staleness,
        }
    }
}

impl WatcherTimings {
    fn options(self, mode: WatchMode) -> PositionOptions {
        PositionOptions {
            high_accuracy: true,
            max_staleness: match mode {
                WatchMode::Emergency => Duration::ZERO,
                WatchMode::Standard => self.standard_max_staleness,
            },
            timeout: self.watch_timeout,
        }
    }
}

#[derive(Default)]
struct WatchState {
    next_subscriber: u64,
    subscribers: HashMap<u64, WatchMode>,
    active: Option<(WatchId, PositionOptions)>,
}

impl WatchState {
    fn required_mode(&self) -> Option<WatchMode> {
        if self.subscribers.is_empty() {
            None
        } else if self.subscribers.values().any(|m| *m == WatchMode::Emergency) {
            Some(WatchMode::Emergency)
        } else {
            Some(WatchMode::Standard)
        }
    }
}

struct WatcherInner {
    provider: Arc<dyn GeolocationProvider>,
    timings: WatcherTimings,
    sender: broadcast::Sender<LocationFix>,
    last_known: Arc<Mutex<Option<LocationSample>>>,
    state: Mutex<WatchState>,
}

impl WatcherInner {
    /// Opens, re-opens or closes the platform watch to match subscribers.
    fn reconcile(&self, state: &mut WatchState) {
        let wanted = state.required_mode().map(|m| self.timings.options(m));
        let current = state.active.map(|(_, options)| options);
        if wanted == current {
            return;
        }

        if let Some((id, _)) = state.active.take() {
            self.provider.clear_watch(id);
            tracing::debug!(watch_id = id.0, "Platform location watch cleared");
        }

        let Some(options) = wanted else {
            return;
        };

        let sender = self.sender.clone();
        let last_known = Arc::clone(&self.last_known);
        let on_fix = Box::new(move |fix: LocationFix| {
            match &fix {
                Ok(sample) => {
                    metrics::counter!("haven_location_fixes_total", "result" => "ok").increment(1);
                    *last_known.lock().unwrap_or_else(PoisonError::into_inner) = Some(*sample);
                },
                Err(e) => {
                    metrics::counter!("haven_location_fixes_total", "result" => "error")
                        .increment(1);
                    tracing::warn!(error = %e, "Location watch error");
                },
            }
            // No receivers is fine: the subscriber may be between drops.
            let _ = sender.send(fix);
        });

        match self.provider.watch_position(&options, on_fix) {
            Ok(id) => {
                tracing::debug!(
                    watch_id = id.0,
                    max_staleness_ms = u64::try_from(options.max_staleness.as_millis())
                        .unwrap_or(u64::MAX),
                    "Platform location watch opened"
                );
                state.active = Some((id, options));
            },
            Err(e) => {
                tracing::warn!(error = %e, "Could not open location watch");
                let _ = self.sender.send(Err(e));
            },
        }
    }
}

/// Reference-counted location watcher shared by every component.
#[derive(Clone)]
pub struct LocationWatcher {
    inner: Arc<WatcherInner>,
}

impl LocationWatcher {
    /// Creates a watcher with default timings.
    ///
    /// No platform watch is opened until the first subscription.
    #[must_use]
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        Self::with_timings(provider, WatcherTimings::default())
    }

    /// Creates a watcher with explicit timings.
    ///
    /// # Arguments
    ///
    /// * `provider` - Platform geolocation backend
    /// * `timings` - Watch timeout and the staleness accepted in standard mode
    #[must_use]
    pub fn with_timings(provider: Arc<dyn GeolocationProvider>, timings: WatcherTimings) -> Self {
        let (sender, _receiver) = broadcast::channel(FIX_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(WatcherInner {
                provider,
                timings,
                sender,
                last_known: Arc::new(Mutex::new(None)),
                state: Mutex::new(WatchState::default()),
            }),
        }
    }

    /// Registers interest in fixes. Dropping the subscription unregisters.
    #[must_use]
    pub fn subscribe(&self, mode: WatchMode) -> LocationSubscription {
        // Subscribe before opening so synchronous platform errors are seen.
        let receiver = self.inner.sender.subscribe();
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.insert(id, mode);
        self.inner.reconcile(&mut state);
        drop(state);

        LocationSubscription {
            id,
            mode,
            receiver,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Most recent successful fix from any source.
    #[must_use]
    pub fn last_known(&self) -> Option<LocationSample> {
        *self
            .inner
            .last_known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// One-shot fresh fix, falling back to the last known sample.
    ///
    /// Blocks for at most `timeout` (as enforced by the platform).
    #[must_use]
    pub fn current_fix(&self, timeout: Duration) -> Option<LocationSample> {
        match self
            .inner
            .provider
            .current_position(&PositionOptions::fresh(timeout))
        {
            Ok(sample) => {
                *self
                    .inner
                    .last_known
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(sample);
                Some(sample)
            },
            Err(e) => {
                let fallback = self.last_known();
                tracing::warn!(
                    error = %e,
                    has_fallback = fallback.is_some(),
                    "Fresh location fix failed"
                );
                fallback
            },
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Options of the open platform watch, if any.
    #[must_use]
    pub fn active_options(&self) -> Option<PositionOptions> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .map(|(_, options)| options)
    }
}

/// A live registration with the [`LocationWatcher`].
pub struct LocationSubscription {
    id: u64,
    mode: WatchMode,
    receiver: broadcast::Receiver<LocationFix>,
    inner: Arc<WatcherInner>,
}

impl LocationSubscription {
    /// Mode this subscription was opened with.
    #[must_use]
    pub const fn mode(&self) -> WatchMode {
        self.mode
    }

    /// Waits for the next fix or error. Returns `None` once the watcher is gone.
    pub async fn recv(&mut self) -> Option<LocationFix> {
        loop {
            match self.receiver.recv().await {
                Ok(fix) => return Some(fix),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("haven_location_fixes_lagged_total").increment(skipped);
                    tracing::warn!(skipped, "Location subscriber lagged behind");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for LocationSubscription {
    fn drop(&mut self) {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        state.subscribers.remove(&self.id);
        self.inner.reconcile(&mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use crate::platform::StaticGeolocation;

    fn scripted(track: Vec<Location>) -> Arc<StaticGeolocation> {
        Arc::new(StaticGeolocation::scripted(
            Location::new(0.0, 0.0),
            track,
            Duration::from_millis(10),
        ))
    }

    #[tokio::test]
    async fn test_single_platform_watch_for_many_subscribers() {
        let geo = scripted(vec![Location::new(1.0, 1.0)]);
        let watcher = LocationWatcher::new(geo.clone());

        let mut a = watcher.subscribe(WatchMode::Emergency);
        let b = watcher.subscribe(WatchMode::Emergency);
        assert_eq!(geo.watch_calls(), 1);
        assert_eq!(geo.active_watches(), 1);
        assert_eq!(watcher.subscriber_count(), 2);

        let fix = a.recv().await.expect("open").expect("fix");
        assert_eq!(fix.location, Location::new(1.0, 1.0));
        assert_eq!(watcher.last_known().map(|s| s.location), Some(fix.location));

        drop(a);
        assert_eq!(geo.active_watches(), 1);
        drop(b);
        assert_eq!(geo.active_watches(), 0);
        assert!(watcher.active_options().is_none());
    }

    #[test]
    fn test_emergency_subscriber_forces_fresh_fixes() {
        let geo = scripted(Vec::new());
        let watcher = LocationWatcher::new(geo.clone());

        let standard = watcher.subscribe(WatchMode::Standard);
        assert_eq!(
            watcher.active_options().map(|o| o.max_staleness),
            Some(Duration::from_secs(5))
        );

        let emergency = watcher.subscribe(WatchMode::Emergency);
        assert_eq!(
            watcher.active_options().map(|o| o.max_staleness),
            Some(Duration::ZERO)
        );
        assert_eq!(geo.watch_calls(), 2);
        assert_eq!(geo.active_watches(), 1);

        drop(emergency);
        assert_eq!(
            watcher.active_options().map(|o| o.max_staleness),
            Some(Duration::from_secs(5))
        );
        drop(standard);
        assert_eq!(geo.active_watches(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_broadcast() {
        let geo = Arc::new(StaticGeolocation::denied());
        let watcher = LocationWatcher::new(geo);
        let mut sub = watcher.subscribe(WatchMode::Emergency);
        assert_eq!(
            sub.recv().await.expect("open"),
            Err(LocationError::PermissionDenied)
        );
        assert!(watcher.last_known().is_none());
    }

    #[test]
    fn test_current_fix_falls_back_to_last_known() {
        let watcher = LocationWatcher::new(Arc::new(StaticGeolocation::fixed(Location::new(
            3.0, 4.0,
        ))));
        let fix = watcher.current_fix(Duration::from_secs(1)).expect("fix");
        assert_eq!(fix.location, Location::new(3.0, 4.0));

        let denied = LocationWatcher::new(Arc::new(StaticGeolocation::denied()));
        assert!(denied.current_fix(Duration::from_secs(1)).is_none());
    }
}

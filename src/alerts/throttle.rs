//! Minimum spacing between alert resends.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Grants at most one permit per interval.
///
/// An interval of zero grants nothing, which disables resends.
#[derive(Debug)]
pub struct AlertThrottle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl AlertThrottle {
    /// Creates a throttle; the first permit is available after `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(Some(Instant::now())),
        }
    }

    /// Configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes a permit if the interval has elapsed since the last one.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let ready = last.is_none_or(|at| now.saturating_duration_since(at) >= self.interval);
        if ready {
            *last = Some(now);
        }
        ready
    }

    /// Records an alert sent outside the throttle (the initial one).
    pub fn mark_sent(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_disables() {
        let throttle = AlertThrottle::new(Duration::ZERO);
        assert!(!throttle.try_acquire());
        assert!(!throttle.try_acquire_at(Instant::now() + Duration::from_secs(3600)));
    }

    #[test]
    fn test_one_permit_per_interval() {
        let throttle = AlertThrottle::new(Duration::from_secs(30));
        let start = Instant::now();
        assert!(!throttle.try_acquire_at(start + Duration::from_secs(5)));
        assert!(throttle.try_acquire_at(start + Duration::from_secs(31)));
        assert!(!throttle.try_acquire_at(start + Duration::from_secs(40)));
        assert!(throttle.try_acquire_at(start + Duration::from_secs(62)));
    }
}

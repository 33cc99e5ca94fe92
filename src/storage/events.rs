//! Emergency event and location history repository.

use super::{Filter, RemoteStore, Row, from_rows, to_row};
use crate::models::{EmergencyEvent, EventStatus, LocationSample, LocationUpdate, UserId};
use crate::{Error, Result};
use serde_json::{Value, json};
use std::sync::Arc;

/// One row per SOS session.
pub const EMERGENCY_EVENTS_TABLE: &str = "emergency_events";

/// Location samples recorded while a session is active.
pub const LOCATION_UPDATES_TABLE: &str = "location_updates";

/// Records SOS sessions and their location trail in the remote store.
#[derive(Clone)]
pub struct EmergencyEventRepository {
    store: Arc<dyn RemoteStore>,
}

impl EmergencyEventRepository {
    /// Creates a repository over the `emergency_events` and
    /// `location_updates` tables of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Inserts an `active` event for `user`.
    pub fn create(
        &self,
        user: &UserId,
        sample: Option<&LocationSample>,
        details: Option<&str>,
    ) -> Result<EmergencyEvent> {
        let row = to_row(&json!({
            "user_id": user.as_str(),
            "location": sample.map(|s| s.location),
            "status": EventStatus::Active.as_str(),
            "details": details,
        }))?;
        let stored = self.store.insert(EMERGENCY_EVENTS_TABLE, vec![row])?;
        from_rows::<EmergencyEvent>(stored)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation("create_emergency_event", "store returned no row"))
    }

    /// Most recent `active` event for `user`, if any.
    pub fn active(&self, user: &UserId) -> Result<Option<EmergencyEvent>> {
        let filter = Filter::new()
            .eq("user_id", user.as_str())
            .eq("status", EventStatus::Active.as_str())
            .order_by("created_at", false)
            .limit(1);
        let rows = self.store.select(EMERGENCY_EVENTS_TABLE, &filter)?;
        Ok(from_rows::<EmergencyEvent>(rows)?.into_iter().next())
    }

    /// Marks an event `resolved` and stamps `resolved_at`.
    pub fn resolve(&self, event_id: &str) -> Result<bool> {
        let mut patch = Row::new();
        patch.insert(
            "status".to_string(),
            Value::from(EventStatus::Resolved.as_str()),
        );
        patch.insert(
            "resolved_at".to_string(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        let updated = self.store.update(
            EMERGENCY_EVENTS_TABLE,
            &Filter::new().eq("id", event_id),
            patch,
        )?;
        Ok(!updated.is_empty())
    }

    /// Appends a location sample to the event's trail.
    pub fn add_location_update(&self, event_id: &str, sample: &LocationSample) -> Result<()> {
        let update = LocationUpdate {
            emergency_event_id: event_id.to_string(),
            latitude: sample.location.lat,
            longitude: sample.location.lng,
            accuracy: sample.accuracy,
        };
        self.store
            .insert(LOCATION_UPDATES_TABLE, vec![to_row(&update)?])
            .map(|_| ())
    }

    /// The event's trail, newest first.
    pub fn location_updates(&self, event_id: &str) -> Result<Vec<LocationUpdate>> {
        let filter = Filter::new()
            .eq("emergency_event_id", event_id)
            .order_by("created_at", false);
        from_rows(self.store.select(LOCATION_UPDATES_TABLE, &filter)?)
    }
}

//! Rows for emergency events, location history and incident reports.

use super::Location;
use serde::{Deserialize, Serialize};

/// Lifecycle of an emergency event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The SOS session is running.
    Active,
    /// The user ended the session.
    Resolved,
}

impl EventStatus {
    /// Column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }
}

/// An emergency event recorded in `emergency_events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEvent {
    /// Row identifier.
    #[serde(deserialize_with = "super::id_as_text")]
    pub id: String,
    /// Owner.
    pub user_id: String,
    /// Location at activation, if known.
    #[serde(default)]
    pub location: Option<Location>,
    /// Current status.
    pub status: EventStatus,
    /// Free-form details.
    #[serde(default)]
    pub details: Option<String>,
    /// RFC 3339 timestamp of resolution.
    #[serde(default)]
    pub resolved_at: Option<String>,
}

/// One row of `location_updates`, linked to an emergency event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// The event this update belongs to.
    #[serde(deserialize_with = "super::id_as_text")]
    pub emergency_event_id: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy in metres.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Review state of an incident report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Submitted, not yet reviewed.
    Pending,
    /// Reviewed by a moderator.
    Reviewed,
}

/// Fields a user submits when reporting an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncidentReport {
    /// Short title.
    pub title: String,
    /// What happened.
    pub description: String,
    /// Free-text place description.
    pub location: String,
    /// Date of the incident as entered (ISO 8601 date).
    pub incident_date: String,
}

/// An incident report row from `incident_reports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    /// Row identifier.
    #[serde(default, deserialize_with = "super::optional_id_as_text")]
    pub id: Option<String>,
    /// Reporter.
    pub user_id: String,
    /// Short title.
    pub title: String,
    /// What happened.
    pub description: String,
    /// Free-text place description.
    #[serde(default)]
    pub location: String,
    /// Date of the incident.
    #[serde(default)]
    pub incident_date: String,
    /// Review state.
    pub status: ReportStatus,
}

//! Incident report repository.

use super::{Filter, RemoteStore, from_rows, to_row};
use crate::models::{IncidentReport, NewIncidentReport, ReportStatus, UserId};
use crate::{Error, Result};
use std::sync::Arc;

/// User-submitted incident reports.
pub const INCIDENT_REPORTS_TABLE: &str = "incident_reports";

/// Submits and lists incident reports.
#[derive(Clone)]
pub struct IncidentRepository {
    store: Arc<dyn RemoteStore>,
}

impl IncidentRepository {
    /// Creates a repository over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Stores a report with status `pending`.
    pub fn submit(&self, user: &UserId, report: NewIncidentReport) -> Result<IncidentReport> {
        if report.title.trim().is_empty() || report.description.trim().is_empty() {
            return Err(Error::InvalidInput(
                "incident title and description are required".to_string(),
            ));
        }
        let row = IncidentReport {
            id: None,
            user_id: user.to_string(),
            title: report.title,
            description: report.description,
            location: report.location,
            incident_date: report.incident_date,
            status: ReportStatus::Pending,
        };
        let mut row = to_row(&row)?;
        row.remove("id");
        let stored = self.store.insert(INCIDENT_REPORTS_TABLE, vec![row])?;
        let saved = from_rows::<IncidentReport>(stored)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::operation("submit_incident", "store returned no row"))?;

        tracing::info!(user_id = %user, report_id = ?saved.id, "Incident report submitted");
        Ok(saved)
    }

    /// Reports filed by `user`.
    pub fn list(&self, user: &UserId) -> Result<Vec<IncidentReport>> {
        let filter = Filter::new()
            .eq("user_id", user.as_str())
            .order_by("created_at", false);
        from_rows(self.store.select(INCIDENT_REPORTS_TABLE, &filter)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn report(title: &str) -> NewIncidentReport {
        NewIncidentReport {
            title: title.to_string(),
            description: "Followed from the bus stop".to_string(),
            location: "MG Road".to_string(),
            incident_date: "2024-05-02".to_string(),
        }
    }

    #[test]
    fn test_submit_sets_pending() {
        let repo = IncidentRepository::new(Arc::new(MemoryStore::new()));
        let user = UserId::new("u1");
        let saved = repo.submit(&user, report("Stalking")).expect("submit");
        assert_eq!(saved.status, ReportStatus::Pending);
        assert!(saved.id.is_some());
        assert_eq!(repo.list(&user).expect("list").len(), 1);
    }

    #[test]
    fn test_submit_rejects_blank_title() {
        let repo = IncidentRepository::new(Arc::new(MemoryStore::new()));
        let result = repo.submit(&UserId::new("u1"), report("  "));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

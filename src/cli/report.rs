//! Report CLI command.

use crate::models::{NewIncidentReport, UserId};
use crate::services::ServiceContainer;
use crate::Result;

/// Submits an incident report.
#[derive(Debug, Clone)]
pub struct ReportCommand {
    user: UserId,
    report: NewIncidentReport,
}

impl ReportCommand {
    /// Creates the command. An empty date means today (UTC).
    #[must_use]
    pub fn new(user: impl Into<String>, mut report: NewIncidentReport) -> Self {
        if report.incident_date.trim().is_empty() {
            report.incident_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        }
        Self {
            user: UserId::new(user),
            report,
        }
    }

    /// Submits the report and renders a confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the title or description is empty or the insert
    /// fails.
    pub fn run(&self, container: &ServiceContainer) -> Result<String> {
        let stored = container
            .incidents()
            .submit(&self.user, self.report.clone())?;
        Ok(format!(
            "Report '{}' submitted for {} (id={})\n",
            stored.title,
            stored.incident_date,
            stored.id.as_deref().unwrap_or("-")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HavenConfig;
    use crate::models::Location;
    use crate::platform::Platform;

    fn report(title: &str, date: &str) -> NewIncidentReport {
        NewIncidentReport {
            title: title.to_string(),
            description: "Followed from the bus stop".to_string(),
            location: "MG Road".to_string(),
            incident_date: date.to_string(),
        }
    }

    #[test]
    fn test_submit_report() {
        let container = ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container");
        let output = ReportCommand::new("u1", report("Harassment", "2024-05-01"))
            .run(&container)
            .expect("submit");
        assert!(output.starts_with("Report 'Harassment' submitted for 2024-05-01"));
        assert_eq!(
            container.incidents().list(&UserId::new("u1")).expect("list").len(),
            1
        );
    }

    #[test]
    fn test_missing_date_defaults_to_today() {
        let command = ReportCommand::new("u1", report("Harassment", " "));
        assert_eq!(command.report.incident_date.len(), 10);
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let container = ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container");
        assert!(ReportCommand::new("u1", report("", "2024-05-01"))
            .run(&container)
            .is_err());
    }
}

//! Drill CLI command: a rehearsal SOS session.

use super::alert::render_outcome;
use crate::models::{NewContact, UserId};
use crate::services::{ActivationReport, DeactivationReport, ServiceContainer};
use crate::{Error, Result};
use std::fmt::Write as _;
use std::time::Duration;

/// Activates a session, holds it, then deactivates it.
#[derive(Debug, Clone)]
pub struct DrillCommand {
    user: UserId,
    hold: Duration,
    seed_contacts: Vec<(String, String)>,
}

/// What happened during a drill.
#[derive(Debug, Clone)]
pub struct DrillReport {
    /// Activation results.
    pub activation: ActivationReport,
    /// Deactivation results.
    pub deactivation: DeactivationReport,
    /// Location updates recorded against the event.
    pub location_updates: usize,
}

impl DrillCommand {
    /// Creates a drill for `user` that stays active for `hold`.
    #[must_use]
    pub fn new(user: impl Into<String>, hold: Duration) -> Self {
        Self {
            user: UserId::new(user),
            hold,
            seed_contacts: Vec::new(),
        }
    }

    /// Adds contacts before the session starts.
    #[must_use]
    pub fn with_seed_contacts(mut self, contacts: Vec<(String, String)>) -> Self {
        self.seed_contacts = contacts;
        self
    }

    /// Runs the drill on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error outside a runtime, when seeding contacts fails, or
    /// when a session is already active.
    pub async fn run(&self, container: &ServiceContainer) -> Result<DrillReport> {
        let controller = container.session_controller()?;

        if !self.seed_contacts.is_empty() {
            let contacts = container.contacts();
            let user = self.user.clone();
            let seeds = self.seed_contacts.clone();
            tokio::task::spawn_blocking(move || {
                for (name, phone) in &seeds {
                    contacts.add(&NewContact::new(&user, name, phone))?;
                }
                Ok::<_, Error>(())
            })
            .await
            .map_err(|e| Error::operation("seed_contacts", e))??;
        }

        let tasks = controller
            .activate(Some(self.user.clone()))
            .ok_or_else(|| Error::InvalidInput("a session is already active".to_string()))?;
        let activation = tasks.join().await;
        tracing::info!(
            user_id = %self.user,
            recording = activation.recording_started,
            alert = activation.alert_succeeded(),
            event_id = ?activation.event_id,
            "Drill session active"
        );

        tokio::time::sleep(self.hold).await;

        let deactivation = match controller.deactivate() {
            Some(tasks) => tasks.join().await,
            None => DeactivationReport::default(),
        };

        let location_updates = match activation.event_id.clone() {
            Some(event_id) => {
                let events = container.events();
                tokio::task::spawn_blocking(move || events.location_updates(&event_id))
                    .await
                    .map_err(|e| Error::operation("location_updates", e))??
                    .len()
            },
            None => 0,
        };

        Ok(DrillReport {
            activation,
            deactivation,
            location_updates,
        })
    }
}

impl DrillReport {
    /// Renders the report for the terminal.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Drill complete");
        let _ = writeln!(
            out,
            "  Recording started: {}",
            self.activation.recording_started
        );
        let _ = writeln!(
            out,
            "  Emergency event: {}",
            self.activation.event_id.as_deref().unwrap_or("(not recorded)")
        );
        match &self.activation.call {
            Some(call) if call.success => {
                let _ = writeln!(out, "  Call: {}", call.uri);
            },
            Some(call) => {
                let _ = writeln!(
                    out,
                    "  Call failed: {}",
                    call.error.as_deref().unwrap_or("unknown error")
                );
            },
            None => {
                let _ = writeln!(out, "  Call: (disabled)");
            },
        }
        let _ = writeln!(out, "  Location updates: {}", self.location_updates);
        let _ = writeln!(
            out,
            "  Alert resends: {}",
            self.deactivation.tracking.resends.len()
        );
        match &self.deactivation.recording {
            Some(saved) => {
                let _ = writeln!(out, "  Recording saved: {}", saved.local_path.display());
                if let Some(remote) = &saved.remote_path {
                    let _ = writeln!(out, "  Recording backup: {remote}");
                }
            },
            None => {
                let _ = writeln!(out, "  Recording saved: (none)");
            },
        }
        let _ = writeln!(out, "  Event resolved: {}", self.deactivation.event_resolved);
        if let Some(alert) = &self.activation.alert {
            out.push_str(&render_outcome(alert));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HavenConfig;
    use crate::models::Location;
    use crate::platform::Platform;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drill_runs_a_full_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HavenConfig::default().with_download_dir(dir.path());
        let container =
            ServiceContainer::from_config(&config, Platform::simulated(Location::new(12.83, 77.65)))
                .expect("container");

        let report = DrillCommand::new("u1", Duration::from_millis(50))
            .with_seed_contacts(vec![("Asha".to_string(), "9876543210".to_string())])
            .run(&container)
            .await
            .expect("drill");

        assert!(report.activation.recording_started);
        assert!(report.activation.alert_succeeded());
        assert!(report.activation.event_id.is_some());
        assert!(report.deactivation.event_resolved);
        let rendered = report.render();
        assert!(rendered.contains("Event resolved: true"));
        assert!(rendered.contains("Alert sent to 1 of 1 contact(s)"));
    }
}

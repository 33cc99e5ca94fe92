//! Business logic services.
//!
//! Services orchestrate the platform seams, the row store and the SMS
//! provider. [`ServiceContainer`] builds them once from configuration and
//! hands out shared instances: there is exactly one [`RecordingService`] and
//! one [`LocationWatcher`] per container.

mod archive;
mod backend_factory;
mod calls;
mod location;
mod quick_actions;
mod recording;
mod session;

pub use archive::{ArchivedRecording, RecordingArchiver};
pub use backend_factory::BackendFactory;
pub use calls::{CallResult, CallTrigger};
pub use location::{LocationFix, LocationSubscription, LocationWatcher, WatchMode, WatcherTimings};
pub use quick_actions::QuickActions;
pub use recording::{
    FALLBACK_MIME_TYPE, PREFERRED_MIME_TYPES, RecordingService, RecordingSettings,
};
pub use session::{
    ActivationReport, ActivationTasks, DeactivationReport, DeactivationTasks, SessionController,
    SessionServices, SessionSettings, SessionSnapshot, TrackingReport,
};

use crate::alerts::AlertDispatcher;
use crate::config::HavenConfig;
use crate::messaging::SmsProvider;
use crate::platform::Platform;
use crate::storage::{ContactRepository, EmergencyEventRepository, IncidentRepository, RemoteStore};
use crate::{Error, Result};
use std::sync::Arc;

/// Shared service instances built from one configuration.
#[derive(Clone)]
pub struct ServiceContainer {
    config: HavenConfig,
    platform: Platform,
    store: Arc<dyn RemoteStore>,
    sms: Option<Arc<dyn SmsProvider>>,
    watcher: LocationWatcher,
    recorder: RecordingService,
}

impl ServiceContainer {
    /// Builds the container from configuration.
    ///
    /// The row store and SMS provider are chosen by [`BackendFactory`];
    /// device access comes from `platform`.
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded haven configuration
    /// * `platform` - Geolocation, capture and telephony implementations
    ///
    /// # Errors
    ///
    /// Returns an error if the configured row store cannot be created.
    pub fn from_config(config: &HavenConfig, platform: Platform) -> Result<Self> {
        let store = BackendFactory::create_store(config)?;
        let sms = BackendFactory::create_sms(config);
        Ok(Self::with_backends(config.clone(), platform, store, sms))
    }

    /// Builds the container around explicit backends.
    ///
    /// Used by tests and by callers that construct their own store or SMS
    /// provider. The location watcher and recorder are created once here and
    /// shared by every service handed out afterwards.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration supplying timings, messages and paths
    /// * `platform` - Geolocation, capture and telephony implementations
    /// * `store` - Row store and file bucket
    /// * `sms` - SMS provider, or `None` when messaging is not configured
    #[must_use]
    pub fn with_backends(
        config: HavenConfig,
        platform: Platform,
        store: Arc<dyn RemoteStore>,
        sms: Option<Arc<dyn SmsProvider>>,
    ) -> Self {
        let watcher = LocationWatcher::with_timings(
            Arc::clone(&platform.geolocation),
            WatcherTimings {
                watch_timeout: config.location.watch_timeout,
                standard_max_staleness: config.location.standard_max_staleness,
            },
        );
        let recorder = RecordingService::new(
            Arc::clone(&platform.capture),
            RecordingSettings::from(&config.recording),
        );
        tracing::debug!(
            store = store.name(),
            sms = sms.as_ref().map_or("none", |s| s.name()),
            "Service container ready"
        );
        Self {
            config,
            platform,
            store,
            sms,
            watcher,
            recorder,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &HavenConfig {
        &self.config
    }

    /// The row store.
    #[must_use]
    pub fn store(&self) -> Arc<dyn RemoteStore> {
        Arc::clone(&self.store)
    }

    /// Trusted contacts.
    #[must_use]
    pub fn contacts(&self) -> ContactRepository {
        ContactRepository::new(self.store())
    }

    /// Emergency events and location history.
    #[must_use]
    pub fn events(&self) -> EmergencyEventRepository {
        EmergencyEventRepository::new(self.store())
    }

    /// Incident reports.
    #[must_use]
    pub fn incidents(&self) -> IncidentRepository {
        IncidentRepository::new(self.store())
    }

    /// Alert dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> AlertDispatcher {
        AlertDispatcher::new(self.contacts(), self.sms.clone())
            .with_country_code(self.config.messaging.default_country_code.clone())
            .with_maps_base_url(self.config.emergency.maps_base_url.clone())
    }

    /// Dialer handoff.
    #[must_use]
    pub fn calls(&self) -> CallTrigger {
        CallTrigger::new(Arc::clone(&self.platform.telephony))
    }

    /// Recording persistence.
    #[must_use]
    pub fn archiver(&self) -> RecordingArchiver {
        RecordingArchiver::new(self.store(), self.config.recording.download_dir.clone())
            .with_upload(self.config.recording.upload)
    }

    /// The shared location watcher.
    #[must_use]
    pub fn watcher(&self) -> LocationWatcher {
        self.watcher.clone()
    }

    /// The shared recorder.
    #[must_use]
    pub fn recorder(&self) -> RecordingService {
        self.recorder.clone()
    }

    /// Check-in alert and call shortcuts.
    #[must_use]
    pub fn quick_actions(&self) -> QuickActions {
        QuickActions::new(
            self.watcher(),
            self.dispatcher(),
            self.contacts(),
            self.calls(),
        )
        .with_settings(
            self.config.emergency.check_in_message.clone(),
            self.config.emergency.services_number.clone(),
            self.config.location.quick_fix_timeout,
        )
    }

    /// A session controller running on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] when called outside a runtime.
    pub fn session_controller(&self) -> Result<SessionController> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::NotConfigured(format!("tokio runtime: {e}")))?;
        Ok(self.session_controller_on(runtime))
    }

    /// A session controller running on `runtime`.
    #[must_use]
    pub fn session_controller_on(&self, runtime: tokio::runtime::Handle) -> SessionController {
        let services = SessionServices {
            recorder: self.recorder.clone().with_runtime(runtime.clone()),
            watcher: self.watcher(),
            dispatcher: self.dispatcher(),
            calls: self.calls(),
            archiver: self.archiver(),
            events: self.events(),
        };
        SessionController::new(services, SessionSettings::from(&self.config), runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    #[test]
    fn test_from_default_config() {
        let container = ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container");
        assert_eq!(container.store().name(), "memory");
        assert!(container.session_controller().is_err());
    }

    #[test]
    fn test_watcher_is_shared() {
        let container = ServiceContainer::from_config(
            &HavenConfig::default(),
            Platform::simulated(Location::new(0.0, 0.0)),
        )
        .expect("container");
        let _sub = container.watcher().subscribe(WatchMode::Standard);
        assert_eq!(container.watcher().subscriber_count(), 1);
    }
}

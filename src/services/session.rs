//! SOS session controller.
//!
//! Owns the active/inactive state and fans each transition out into
//! independent side effects. Every side effect runs as its own task and is
//! handed back to the caller as a named [`JoinHandle`], so one slow or
//! failing collaborator never delays another.
//!
//! # Activation
//!
//! | Task | Effect |
//! |------|--------|
//! | `recording` | Start audio (and video) recording |
//! | `alert` | Fresh location fix, then alert every trusted contact |
//! | `event` | Insert an `active` emergency event |
//! | `call` | After a short delay, hand the emergency number to the dialer |
//!
//! While the session is active a tracking task follows the shared location
//! watcher, appends each fix to the event's trail and resends the alert at
//! most once per resend interval.
//!
//! # Deactivation
//!
//! | Task | Effect |
//! |------|--------|
//! | `recording` | Stop recording, save locally, back up remotely |
//! | `tracking` | Drops the location subscription, then waits for in-flight trail writes and resends |
//! | `event` | Mark the emergency event `resolved` |

use super::archive::{ArchivedRecording, RecordingArchiver};
use super::calls::{CallResult, CallTrigger};
use super::location::{LocationWatcher, WatchMode};
use super::recording::RecordingService;
use crate::alerts::{AlertDispatcher, AlertOutcome, AlertThrottle};
use crate::config::HavenConfig;
use crate::models::{Location, LocationSample, UserId};
use crate::storage::EmergencyEventRepository;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

/// How long deactivation waits for an in-flight event insert.
const EVENT_SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Session behaviour knobs.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Alert text; the map link is appended.
    pub alert_message: String,
    /// Number dialled after activation.
    pub call_number: Option<String>,
    /// Delay before the call.
    pub call_delay: Duration,
    /// Minimum spacing between resends; zero disables resends.
    pub resend_interval: Duration,
    /// Deadline of the activation fix.
    pub activation_fix_timeout: Duration,
    /// Record video as well as audio.
    pub record_video: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&HavenConfig::default())
    }
}

impl From<&HavenConfig> for SessionSettings {
    fn from(config: &HavenConfig) -> Self {
        Self {
            alert_message: config.emergency.alert_message.clone(),
            call_number: config.emergency.call_number.clone(),
            call_delay: config.emergency.call_delay,
            resend_interval: config.emergency.resend_interval,
            activation_fix_timeout: config.location.activation_fix_timeout,
            record_video: config.recording.video,
        }
    }
}

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct SessionServices {
    /// Audio and video recorder started on activation and stopped on
    /// deactivation.
    pub recorder: RecordingService,
    /// Shared location watcher. The session holds an emergency-mode
    /// subscription for as long as it is active.
    pub watcher: LocationWatcher,
    /// Sends the initial alert and every resend.
    pub dispatcher: AlertDispatcher,
    /// Hands the emergency number to the dialer.
    pub calls: CallTrigger,
    /// Saves the finished recording locally and backs it up remotely.
    pub archiver: RecordingArchiver,
    /// Emergency event rows and their location trail.
    pub events: EmergencyEventRepository,
}

/// Side effects of one activation.
#[derive(Debug)]
pub struct ActivationTasks {
    /// Whether recording started.
    pub recording: JoinHandle<bool>,
    /// Initial alert; `None` when no user is signed in.
    pub alert: JoinHandle<Option<AlertOutcome>>,
    /// Emergency event row ID, when the insert succeeded.
    pub event: JoinHandle<Option<String>>,
    /// Delayed call, when an emergency number is configured.
    pub call: Option<JoinHandle<CallResult>>,
}

/// Settled results of an activation.
#[derive(Debug, Clone, Default)]
pub struct ActivationReport {
    /// Whether the recorder reported a live stream.
    pub recording_started: bool,
    /// Initial alert outcome; `None` when no user was signed in or the task
    /// panicked.
    pub alert: Option<AlertOutcome>,
    /// Emergency event row ID, when the insert succeeded.
    pub event_id: Option<String>,
    /// Call handoff result; `None` when no emergency number is configured.
    pub call: Option<CallResult>,
}

impl ActivationReport {
    /// Whether the initial alert reached at least one contact.
    #[must_use]
    pub fn alert_succeeded(&self) -> bool {
        self.alert.as_ref().is_some_and(|a| a.success)
    }
}

impl ActivationTasks {
    /// Awaits every task. A panicked task reports as failed.
    pub async fn join(self) -> ActivationReport {
        let call = match self.call {
            Some(call) => settle("call", call).await,
            None => None,
        };
        ActivationReport {
            recording_started: settle("recording", self.recording).await.unwrap_or(false),
            alert: settle("alert", self.alert).await.flatten(),
            event_id: settle("event", self.event).await.flatten(),
            call,
        }
    }
}

/// Side effects of one deactivation.
#[derive(Debug)]
pub struct DeactivationTasks {
    /// Where the recording was saved, if one was captured.
    pub recording: JoinHandle<Option<ArchivedRecording>>,
    /// Location tracking shutdown, with everything tracking did.
    pub tracking: JoinHandle<TrackingReport>,
    /// Whether the emergency event was resolved.
    pub event: JoinHandle<bool>,
}

/// Settled results of a deactivation.
#[derive(Debug, Clone, Default)]
pub struct DeactivationReport {
    /// Where the recording was saved; `None` when nothing was captured or
    /// saving failed.
    pub recording: Option<ArchivedRecording>,
    /// Whether the emergency event row was marked `resolved`.
    pub event_resolved: bool,
    /// What location tracking did while the session was active.
    pub tracking: TrackingReport,
}

/// Work done by the tracking task over one session.
///
/// Every location-update insert and alert resend started by a tick is
/// awaited before the report is produced, so the counts are final.
#[derive(Debug, Clone, Default)]
pub struct TrackingReport {
    /// Location fixes received.
    pub ticks: usize,
    /// Fixes stored as `location_updates` rows.
    pub location_updates: usize,
    /// Outcome of each throttled resend, in completion order.
    pub resends: Vec<AlertOutcome>,
}

impl TrackingReport {
    /// Messages delivered by resends, summed over contacts.
    #[must_use]
    pub fn resent_messages(&self) -> usize {
        self.resends.iter().map(AlertOutcome::sent_count).sum()
    }
}

impl DeactivationTasks {
    /// Awaits every task. A panicked task reports as failed.
    pub async fn join(self) -> DeactivationReport {
        let tracking = settle("tracking", self.tracking).await.unwrap_or_default();
        DeactivationReport {
            recording: settle("archive", self.recording).await.flatten(),
            event_resolved: settle("resolve_event", self.event).await.unwrap_or(false),
            tracking,
        }
    }
}

async fn settle<T>(task: &'static str, handle: JoinHandle<T>) -> Option<T> {
    match handle.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!(task, error = %e, "Session task did not complete");
            None
        },
    }
}

/// Read-only view of the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Signed-in user, if any.
    pub user: Option<UserId>,
    /// Activation time.
    pub started_at: SystemTime,
    /// Emergency event row, once inserted.
    pub event_id: Option<String>,
    /// Most recent position seen by this session: the activation fix, then
    /// each tracking tick.
    pub last_known_location: Option<Location>,
    /// Resends that have completed so far.
    pub resends_sent: usize,
}

/// Per-session state written by the activation and tracking tasks.
#[derive(Debug, Default)]
struct SessionTrail {
    last_known_location: Option<Location>,
    resends_sent: usize,
}

type SharedTrail = Arc<Mutex<SessionTrail>>;

fn lock_trail(trail: &Mutex<SessionTrail>) -> std::sync::MutexGuard<'_, SessionTrail> {
    trail.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum EventSlot {
    Pending,
    Created(String),
    Failed,
}

struct ActiveSession {
    user: Option<UserId>,
    started_at: SystemTime,
    event: watch::Receiver<EventSlot>,
    trail: SharedTrail,
    stop_tracking: oneshot::Sender<()>,
    tracking: JoinHandle<TrackingReport>,
}

/// Drives SOS sessions.
#[derive(Clone)]
pub struct SessionController {
    services: SessionServices,
    settings: Arc<SessionSettings>,
    runtime: Handle,
    session: Arc<Mutex<Option<ActiveSession>>>,
}

impl SessionController {
    /// Creates an inactive session controller.
    ///
    /// Every side effect of [`activate`](Self::activate) and
    /// [`deactivate`](Self::deactivate) is spawned on `runtime`, so both may
    /// be called from synchronous code.
    ///
    /// # Arguments
    ///
    /// * `services` - Collaborators driven by each transition
    /// * `settings` - Alert text, call number, resend interval and fix deadline
    /// * `runtime` - Tokio runtime that runs the session tasks
    #[must_use]
    pub fn new(services: SessionServices, settings: SessionSettings, runtime: Handle) -> Self {
        Self {
            services,
            settings: Arc::new(settings),
            runtime,
            session: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    /// The active session, if any.
    #[must_use]
    pub fn session(&self) -> Option<SessionSnapshot> {
        self.lock().as_ref().map(|s| {
            let trail = lock_trail(&s.trail);
            SessionSnapshot {
                user: s.user.clone(),
                started_at: s.started_at,
                event_id: match &*s.event.borrow() {
                    EventSlot::Created(id) => Some(id.clone()),
                    EventSlot::Pending | EventSlot::Failed => None,
                },
                last_known_location: trail.last_known_location,
                resends_sent: trail.resends_sent,
            }
        })
    }

    /// Enters the active state.
    ///
    /// Returns `None` (and does nothing) when already active. Side effects
    /// are spawned immediately and never undo the transition.
    #[must_use = "activation tasks report the outcome of each side effect"]
    pub fn activate(&self, user: Option<UserId>) -> Option<ActivationTasks> {
        let mut session = self.lock();
        if session.is_some() {
            tracing::debug!("SOS already active");
            return None;
        }

        metrics::counter!("haven_sessions_total", "transition" => "activate").increment(1);
        tracing::info!(user_id = ?user.as_ref().map(UserId::as_str), "SOS activated");

        let throttle = Arc::new(AlertThrottle::new(self.settings.resend_interval));
        let trail = SharedTrail::default();
        let (event_tx, event_rx) = watch::channel(EventSlot::Pending);
        let (stop_tx, stop_rx) = oneshot::channel();

        let tasks = ActivationTasks {
            recording: self.spawn_recording(),
            alert: self.spawn_initial_alert(user.clone(), Arc::clone(&throttle), Arc::clone(&trail)),
            event: self.spawn_event_insert(user.clone(), event_tx),
            call: self.spawn_call(),
        };
        let tracking = self.spawn_tracking(
            user.clone(),
            throttle,
            Arc::clone(&trail),
            event_rx.clone(),
            stop_rx,
        );

        *session = Some(ActiveSession {
            user,
            started_at: SystemTime::now(),
            event: event_rx,
            trail,
            stop_tracking: stop_tx,
            tracking,
        });
        Some(tasks)
    }

    /// Leaves the active state.
    ///
    /// Returns `None` (and does nothing) when already inactive.
    #[must_use = "deactivation tasks report the outcome of each side effect"]
    pub fn deactivate(&self) -> Option<DeactivationTasks> {
        let Some(active) = self.lock().take() else {
            tracing::debug!("SOS already inactive");
            return None;
        };

        metrics::counter!("haven_sessions_total", "transition" => "deactivate").increment(1);
        tracing::info!(
            user_id = ?active.user.as_ref().map(UserId::as_str),
            elapsed_secs = active.started_at.elapsed().map(|d| d.as_secs()).unwrap_or(0),
            "SOS deactivated"
        );

        // The tracking task may already have ended on its own.
        let _ = active.stop_tracking.send(());

        Some(DeactivationTasks {
            recording: self.spawn_archive(active.user),
            tracking: active.tracking,
            event: self.spawn_event_resolve(active.event),
        })
    }

    fn spawn_recording(&self) -> JoinHandle<bool> {
        let recorder = self.services.recorder.clone();
        let video = self.settings.record_video;
        self.runtime
            .spawn_blocking(move || recorder.start_recording(video, true))
    }

    fn spawn_initial_alert(
        &self,
        user: Option<UserId>,
        throttle: Arc<AlertThrottle>,
        trail: SharedTrail,
    ) -> JoinHandle<Option<AlertOutcome>> {
        let watcher = self.services.watcher.clone();
        let dispatcher = self.services.dispatcher.clone();
        let settings = Arc::clone(&self.settings);
        self.runtime.spawn_blocking(move || {
            let fix = watcher.current_fix(settings.activation_fix_timeout);
            if let Some(sample) = &fix {
                // A tracking tick may already have landed a newer position.
                lock_trail(&trail)
                    .last_known_location
                    .get_or_insert(sample.location);
            }
            let Some(user) = user else {
                tracing::warn!("No signed-in user, emergency alert not sent");
                return None;
            };
            let outcome = dispatcher.send_emergency_alert(
                &user,
                &settings.alert_message,
                fix.map(|s| s.location),
            );
            throttle.mark_sent();
            Some(outcome)
        })
    }

    fn spawn_event_insert(
        &self,
        user: Option<UserId>,
        slot: watch::Sender<EventSlot>,
    ) -> JoinHandle<Option<String>> {
        let events = self.services.events.clone();
        let watcher = self.services.watcher.clone();
        self.runtime.spawn_blocking(move || {
            let Some(user) = user else {
                slot.send_replace(EventSlot::Failed);
                return None;
            };
            let sample = watcher.last_known();
            match events.create(&user, sample.as_ref(), Some("SOS activated")) {
                Ok(event) => {
                    slot.send_replace(EventSlot::Created(event.id.clone()));
                    Some(event.id)
                },
                Err(e) => {
                    tracing::warn!(user_id = %user, error = %e, "Could not record emergency event");
                    slot.send_replace(EventSlot::Failed);
                    None
                },
            }
        })
    }

    fn spawn_call(&self) -> Option<JoinHandle<CallResult>> {
        let number = self.settings.call_number.clone()?;
        let calls = self.services.calls.clone();
        let delay = self.settings.call_delay;
        Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::task::spawn_blocking(move || calls.call(&number)).await {
                Ok(result) => result,
                Err(e) => CallResult {
                    success: false,
                    uri: String::new(),
                    error: Some(e.to_string()),
                },
            }
        }))
    }

    fn spawn_tracking(
        &self,
        user: Option<UserId>,
        throttle: Arc<AlertThrottle>,
        trail: SharedTrail,
        event: watch::Receiver<EventSlot>,
        mut stop: oneshot::Receiver<()>,
    ) -> JoinHandle<TrackingReport> {
        let services = self.services.clone();
        let settings = Arc::clone(&self.settings);
        let mut subscription = services.watcher.subscribe(WatchMode::Emergency);

        self.runtime.spawn(async move {
            let mut report = TrackingReport::default();
            let mut work = JoinSet::new();
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    fix = subscription.recv() => match fix {
                        Some(Ok(sample)) => {
                            report.ticks += 1;
                            lock_trail(&trail).last_known_location = Some(sample.location);
                            on_location_tick(
                                &services,
                                &settings,
                                user.as_ref(),
                                &throttle,
                                &event,
                                sample,
                                &mut work,
                            );
                        },
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Emergency location tracking error");
                        },
                        None => break,
                    },
                    Some(done) = work.join_next(), if !work.is_empty() => {
                        record_tick_work(&mut report, &trail, done);
                    },
                }
            }
            drop(subscription);

            while let Some(done) = work.join_next().await {
                record_tick_work(&mut report, &trail, done);
            }
            tracing::debug!(
                ticks = report.ticks,
                location_updates = report.location_updates,
                resends = report.resends.len(),
                "Emergency location tracking stopped"
            );
            report
        })
    }

    fn spawn_archive(&self, user: Option<UserId>) -> JoinHandle<Option<ArchivedRecording>> {
        let recorder = self.services.recorder.clone();
        let archiver = self.services.archiver.clone();
        self.runtime.spawn_blocking(move || {
            let blob = recorder.stop_recording()?;
            match archiver.archive(&blob, user.as_ref()) {
                Ok(archived) => Some(archived),
                Err(e) => {
                    tracing::error!(error = %e, "Could not save recording");
                    None
                },
            }
        })
    }

    fn spawn_event_resolve(&self, mut event: watch::Receiver<EventSlot>) -> JoinHandle<bool> {
        let events = self.services.events.clone();
        self.runtime.spawn(async move {
            let id = {
                let settled = tokio::time::timeout(
                    EVENT_SETTLE_TIMEOUT,
                    event.wait_for(|slot| *slot != EventSlot::Pending),
                )
                .await;
                match settled {
                    Ok(Ok(slot)) => match &*slot {
                        EventSlot::Created(id) => id.clone(),
                        EventSlot::Pending | EventSlot::Failed => return false,
                    },
                    Ok(Err(_)) | Err(_) => {
                        tracing::warn!("Emergency event insert never settled");
                        return false;
                    },
                }
            };

            let resolved = tokio::task::spawn_blocking(move || events.resolve(&id)).await;
            match resolved {
                Ok(Ok(resolved)) => resolved,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Could not resolve emergency event");
                    false
                },
                Err(e) => {
                    tracing::error!(error = %e, "Resolve task did not complete");
                    false
                },
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Side effect started by a location tick.
enum TickWork {
    LocationUpdate(bool),
    Resend(AlertOutcome),
}

/// Records a fix against the event and resends the alert when permitted.
///
/// Both side effects run on the blocking pool and are tracked in `work` so
/// the tracking task can account for them before it reports.
fn on_location_tick(
    services: &SessionServices,
    settings: &Arc<SessionSettings>,
    user: Option<&UserId>,
    throttle: &AlertThrottle,
    event: &watch::Receiver<EventSlot>,
    sample: LocationSample,
    work: &mut JoinSet<TickWork>,
) {
    metrics::counter!("haven_session_location_ticks_total").increment(1);

    let event_id = match &*event.borrow() {
        EventSlot::Created(id) => Some(id.clone()),
        EventSlot::Pending | EventSlot::Failed => None,
    };
    if let Some(id) = event_id {
        let events = services.events.clone();
        work.spawn_blocking(move || match events.add_location_update(&id, &sample) {
            Ok(_) => TickWork::LocationUpdate(true),
            Err(e) => {
                tracing::debug!(error = %e, "Could not record location update");
                TickWork::LocationUpdate(false)
            },
        });
    }

    let Some(user) = user else {
        return;
    };
    if !throttle.try_acquire() {
        return;
    }
    let dispatcher = services.dispatcher.clone();
    let settings = Arc::clone(settings);
    let user = user.clone();
    tracing::info!(user_id = %user, location = %sample.location, "Resending emergency alert");
    work.spawn_blocking(move || {
        TickWork::Resend(dispatcher.send_emergency_alert(
            &user,
            &settings.alert_message,
            Some(sample.location),
        ))
    });
}

fn record_tick_work(
    report: &mut TrackingReport,
    trail: &Mutex<SessionTrail>,
    done: std::result::Result<TickWork, tokio::task::JoinError>,
) {
    match done {
        Ok(TickWork::LocationUpdate(stored)) => report.location_updates += usize::from(stored),
        Ok(TickWork::Resend(outcome)) => {
            metrics::counter!("haven_session_resends_total").increment(1);
            lock_trail(trail).resends_sent += 1;
            report.resends.push(outcome);
        },
        Err(e) => tracing::error!(error = %e, "Location tick task did not complete"),
    }
}

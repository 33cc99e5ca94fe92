//! Audio/video recording service.
//!
//! Wraps a [`MediaCapture`] backend: acquires a stream, buffers encoded
//! chunks as they arrive, and concatenates them into one [`MediaBlob`] when
//! the recording stops.
//!
//! At most one recording is live at a time. A recording that reaches the
//! duration ceiling is stopped automatically and its blob is kept until the
//! next [`RecordingService::stop_recording`] call.

use crate::config::RecordingConfig;
use crate::models::MediaBlob;
use crate::platform::{CaptureConstraints, CaptureStream, ChunkSink, MediaCapture, RecorderOptions};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Container/codec preference, best first.
pub const PREFERRED_MIME_TYPES: [&str; 3] =
    ["video/webm;codecs=vp9,opus", "video/webm", "video/mp4"];

/// Used when the encoder reports support for none of the preferred types.
pub const FALLBACK_MIME_TYPE: &str = "video/webm";

/// Encoder and duration settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSettings {
    /// Auto-stop after this long.
    pub max_duration: Duration,
    /// Chunk delivery interval.
    pub timeslice: Duration,
    /// Video bitrate.
    pub video_bits_per_second: u32,
    /// Audio bitrate.
    pub audio_bits_per_second: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self::from(&RecordingConfig::default())
    }
}

impl From<&RecordingConfig> for RecordingSettings {
    fn from(config: &RecordingConfig) -> Self {
        Self {
            max_duration: config.max_duration,
            timeslice: config.timeslice,
            video_bits_per_second: config.video_bits_per_second,
            audio_bits_per_second: config.audio_bits_per_second,
        }
    }
}

type ChunkBuffer = Arc<Mutex<Vec<Vec<u8>>>>;

struct ActiveRecording {
    stream: Box<dyn CaptureStream>,
    chunks: ChunkBuffer,
    mime_type: String,
    generation: u64,
    started: Instant,
    timer: Option<tokio::task::JoinHandle<()>>,
}

#[derive(Default)]
struct RecorderState {
    active: Option<ActiveRecording>,
    generation: u64,
    retained: Option<MediaBlob>,
}

/// Records from the platform camera and microphone.
///
/// Constructed once and shared; clones refer to the same recorder.
#[derive(Clone)]
pub struct RecordingService {
    capture: Arc<dyn MediaCapture>,
    settings: RecordingSettings,
    state: Arc<Mutex<RecorderState>>,
    runtime: Option<tokio::runtime::Handle>,
}

impl RecordingService {
    /// Creates a recorder over `capture`.
    ///
    /// # Arguments
    ///
    /// * `capture` - Platform media capture backend
    /// * `settings` - Preferred MIME types, chunk interval and duration ceiling
    ///
    /// The duration ceiling is enforced with a timer on the current Tokio
    /// runtime; outside a runtime recordings only stop when asked.
    #[must_use]
    pub fn new(capture: Arc<dyn MediaCapture>, settings: RecordingSettings) -> Self {
        Self {
            capture,
            settings,
            state: Arc::new(Mutex::new(RecorderState::default())),
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    /// Runs the duration timer on `runtime`.
    #[must_use]
    pub fn with_runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Recorder settings.
    #[must_use]
    pub const fn settings(&self) -> &RecordingSettings {
        &self.settings
    }

    /// Whether a recording is live.
    #[must_use]
    pub fn is_currently_recording(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Starts recording the requested tracks.
    ///
    /// A live recording is stopped and discarded first. Returns `false` when
    /// the stream cannot be acquired or the encoder refuses to start.
    pub fn start_recording(&self, video: bool, audio: bool) -> bool {
        let mut state = self.lock();

        if let Some(previous) = state.active.take() {
            tracing::warn!("Recording already in progress, discarding it");
            if let Some(timer) = &previous.timer {
                timer.abort();
            }
            drop(finish(previous));
        }
        if state.retained.take().is_some() {
            tracing::warn!("Discarding unclaimed auto-stopped recording");
        }

        let constraints = CaptureConstraints::from_flags(video, audio);
        if constraints.is_empty() {
            tracing::warn!("Recording requested with neither video nor audio");
            return false;
        }

        let mut stream = match self.capture.open(&constraints) {
            Ok(stream) => stream,
            Err(e) => {
                metrics::counter!("haven_recordings_total", "result" => "denied").increment(1);
                tracing::error!(error = %e, video, audio, "Could not acquire capture stream");
                return false;
            },
        };

        let mime_type = self.negotiate_mime_type();
        let options = RecorderOptions {
            mime_type: mime_type.clone(),
            video_bits_per_second: video.then_some(self.settings.video_bits_per_second),
            audio_bits_per_second: self.settings.audio_bits_per_second,
            timeslice: self.settings.timeslice,
        };

        let chunks: ChunkBuffer = Arc::new(Mutex::new(Vec::new()));
        let sink_chunks = Arc::clone(&chunks);
        let sink: ChunkSink = Arc::new(move |chunk: Vec<u8>| {
            if !chunk.is_empty() {
                sink_chunks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(chunk);
            }
        });

        if let Err(e) = stream.start(&options, sink) {
            metrics::counter!("haven_recordings_total", "result" => "failed").increment(1);
            tracing::error!(error = %e, mime_type = %mime_type, "Encoder failed to start");
            stream.release_tracks();
            return false;
        }

        state.generation += 1;
        let generation = state.generation;
        let timer = self.schedule_auto_stop(generation);
        state.active = Some(ActiveRecording {
            stream,
            chunks,
            mime_type: mime_type.clone(),
            generation,
            started: Instant::now(),
            timer,
        });

        metrics::counter!("haven_recordings_total", "result" => "started").increment(1);
        tracing::info!(mime_type = %mime_type, video, audio, generation, "Recording started");
        true
    }

    /// Stops the live recording and returns its media.
    ///
    /// When nothing is live, returns the recording that was auto-stopped at
    /// the duration ceiling, if any. Returns `None` when no data was captured.
    pub fn stop_recording(&self) -> Option<MediaBlob> {
        let mut state = self.lock();
        let Some(active) = state.active.take() else {
            let retained = state.retained.take();
            if retained.is_none() {
                tracing::debug!("No recording in progress");
            }
            return retained;
        };
        drop(state);

        if let Some(timer) = &active.timer {
            timer.abort();
        }
        finish(active)
    }

    fn negotiate_mime_type(&self) -> String {
        PREFERRED_MIME_TYPES
            .iter()
            .find(|t| self.capture.is_type_supported(t))
            .map_or_else(|| FALLBACK_MIME_TYPE.to_string(), ToString::to_string)
    }

    fn schedule_auto_stop(&self, generation: u64) -> Option<tokio::task::JoinHandle<()>> {
        let runtime = self.runtime.as_ref()?;
        let max_duration = self.settings.max_duration;
        let state = Arc::clone(&self.state);
        Some(runtime.spawn(async move {
            tokio::time::sleep(max_duration).await;
            // Stopping joins the encoder, so keep it off the async workers.
            let stopped =
                tokio::task::spawn_blocking(move || auto_stop(&state, generation, max_duration));
            if let Err(e) = stopped.await {
                tracing::error!(error = %e, "Auto-stop task failed");
            }
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops a recording that hit the ceiling, unless a newer one replaced it.
fn auto_stop(state: &Mutex<RecorderState>, generation: u64, max_duration: Duration) {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    let current = guard.active.as_ref().map(|a| a.generation);
    if current != Some(generation) {
        return;
    }
    let Some(active) = guard.active.take() else {
        return;
    };
    tracing::info!(
        max_duration_secs = max_duration.as_secs(),
        "Maximum recording duration reached, stopping"
    );
    metrics::counter!("haven_recordings_total", "result" => "auto_stopped").increment(1);
    guard.retained = finish(active);
}

/// Flushes, stops and releases a stream, then assembles the blob.
fn finish(mut active: ActiveRecording) -> Option<MediaBlob> {
    if let Err(e) = active.stream.request_data() {
        tracing::warn!(error = %e, "Could not request final data chunk");
    }
    if let Err(e) = active.stream.stop() {
        tracing::warn!(error = %e, "Encoder did not stop cleanly");
    }
    active.stream.release_tracks();

    let mime_type = active.stream.mime_type().unwrap_or(active.mime_type);
    let chunks = std::mem::take(
        &mut *active
            .chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
    );
    let elapsed_ms = u64::try_from(active.started.elapsed().as_millis()).unwrap_or(u64::MAX);

    if chunks.is_empty() {
        tracing::warn!(elapsed_ms, "Recording stopped without any data");
        return None;
    }

    let blob = MediaBlob::from_chunks(chunks, mime_type);
    metrics::histogram!("haven_recording_bytes").record(blob.len() as f64);
    tracing::info!(
        bytes = blob.len(),
        mime_type = %blob.mime_type,
        elapsed_ms,
        "Recording stopped"
    );
    Some(blob)
}

//! Simulated platform backends for drills, the CLI and tests.

use super::capture::{CaptureConstraints, CaptureStream, ChunkSink, MediaCapture, RecorderOptions};
use super::geolocation::{FixCallback, GeolocationProvider, PositionOptions, WatchId};
use crate::models::{Location, LocationError, LocationSample};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Geolocation that reports a fixed position or walks a scripted track.
///
/// Each watch runs on its own thread, emitting the track points in order
/// and then going quiet until cleared.
pub struct StaticGeolocation {
    fix: Option<Location>,
    track: Vec<Location>,
    interval: Duration,
    next_id: AtomicU64,
    watches: Mutex<HashMap<WatchId, Arc<AtomicBool>>>,
    watch_calls: AtomicUsize,
}

impl StaticGeolocation {
    /// Always reports `location`.
    #[must_use]
    pub fn fixed(location: Location) -> Self {
        Self::scripted(location, Vec::new(), Duration::from_millis(500))
    }

    /// Reports `current` for one-shot requests; watches emit `track`.
    #[must_use]
    pub fn scripted(current: Location, track: Vec<Location>, interval: Duration) -> Self {
        Self {
            fix: Some(current),
            track,
            interval,
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
            watch_calls: AtomicUsize::new(0),
        }
    }

    /// Behaves as if the user refused location permission.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            fix: None,
            track: Vec::new(),
            interval: Duration::from_millis(500),
            next_id: AtomicU64::new(1),
            watches: Mutex::new(HashMap::new()),
            watch_calls: AtomicUsize::new(0),
        }
    }

    /// Number of platform watches currently open.
    pub fn active_watches(&self) -> usize {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of `watch_position` calls so far.
    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }
}

impl GeolocationProvider for StaticGeolocation {
    fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> std::result::Result<LocationSample, LocationError> {
        self.fix
            .map(|loc| LocationSample::now(loc).with_accuracy(5.0))
            .ok_or(LocationError::PermissionDenied)
    }

    fn watch_position(
        &self,
        _options: &PositionOptions,
        on_fix: FixCallback,
    ) -> std::result::Result<WatchId, LocationError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let id = WatchId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let cancelled = Arc::new(AtomicBool::new(false));
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&cancelled));

        let Some(current) = self.fix else {
            on_fix(Err(LocationError::PermissionDenied));
            return Ok(id);
        };

        let points = if self.track.is_empty() {
            vec![current]
        } else {
            self.track.clone()
        };
        let interval = self.interval;

        std::thread::spawn(move || {
            for point in points {
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                on_fix(Ok(LocationSample::now(point).with_accuracy(5.0)));
                std::thread::sleep(interval);
            }
        });

        Ok(id)
    }

    fn clear_watch(&self, id: WatchId) {
        if let Some(flag) = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
        {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

/// Capture backend that produces synthetic chunks instead of touching devices.
pub struct SimulatedCapture {
    supported: Vec<String>,
    deny: bool,
    chunk_size: usize,
    live_streams: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl SimulatedCapture {
    /// Supports WebM (VP9/Opus) and emits 64-byte chunks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            supported: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm".to_string(),
            ],
            deny: false,
            chunk_size: 64,
            live_streams: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
        }
    }

    /// Refuses camera and microphone access.
    #[must_use]
    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new()
        }
    }

    /// Opens streams that never produce data.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            chunk_size: 0,
            ..Self::new()
        }
    }

    /// Restricts the encoder to the given MIME types.
    #[must_use]
    pub fn with_supported_types(mut self, types: &[&str]) -> Self {
        self.supported = types.iter().map(ToString::to_string).collect();
        self
    }

    /// Streams whose tracks have not been released yet.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    /// Total streams ever opened.
    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaCapture for SimulatedCapture {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|t| t == mime_type)
    }

    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn CaptureStream>> {
        if self.deny {
            return Err(Error::PermissionDenied(
                "camera and microphone access refused".to_string(),
            ));
        }
        if constraints.is_empty() {
            return Err(Error::InvalidInput(
                "at least one of video or audio must be requested".to_string(),
            ));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live_streams.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SimulatedStream {
            live: Arc::clone(&self.live_streams),
            released: false,
            mime_type: None,
            shared: Arc::new(StreamShared {
                running: AtomicBool::new(false),
                sink: Mutex::new(None),
                seq: AtomicU64::new(0),
                chunk_size: self.chunk_size,
            }),
            worker: None,
        }))
    }
}

struct StreamShared {
    running: AtomicBool,
    sink: Mutex<Option<ChunkSink>>,
    seq: AtomicU64,
    chunk_size: usize,
}

impl StreamShared {
    fn emit(&self) {
        if self.chunk_size == 0 {
            return;
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let sink = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sink) = sink {
            // Low byte of the sequence number is enough to tell chunks apart.
            #[allow(clippy::cast_possible_truncation)]
            sink(vec![seq as u8; self.chunk_size]);
        }
    }
}

struct SimulatedStream {
    live: Arc<AtomicUsize>,
    released: bool,
    mime_type: Option<String>,
    shared: Arc<StreamShared>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedStream {
    fn halt_worker(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl CaptureStream for SimulatedStream {
    fn start(&mut self, options: &RecorderOptions, sink: ChunkSink) -> Result<()> {
        if self.released {
            return Err(Error::operation(
                "recorder_start",
                "stream tracks already released",
            ));
        }
        *self
            .shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
        self.mime_type = Some(options.mime_type.clone());
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let timeslice = options.timeslice;
        self.worker = Some(std::thread::spawn(move || {
            loop {
                std::thread::sleep(timeslice);
                if !shared.running.load(Ordering::SeqCst) {
                    return;
                }
                shared.emit();
            }
        }));
        Ok(())
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn request_data(&mut self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst) {
            self.shared.emit();
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.halt_worker();
        self.shared
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }

    fn release_tracks(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.halt_worker();
    }
}

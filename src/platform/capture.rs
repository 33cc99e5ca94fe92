//! Platform capture contract (camera, microphone, encoder).

use std::sync::Arc;
use std::time::Duration;

/// Which camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Front camera.
    User,
    /// Rear camera.
    Environment,
}

/// Video track constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoConstraints {
    /// Camera selection.
    pub facing_mode: FacingMode,
    /// Preferred width in pixels.
    pub ideal_width: u32,
    /// Preferred height in pixels.
    pub ideal_height: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::User,
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// Audio track constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConstraints {
    /// Cancel speaker echo.
    pub echo_cancellation: bool,
    /// Suppress background noise.
    pub noise_suppression: bool,
    /// Normalize input level.
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Tracks requested from the platform. `None` disables the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureConstraints {
    /// Video track.
    pub video: Option<VideoConstraints>,
    /// Audio track.
    pub audio: Option<AudioConstraints>,
}

impl CaptureConstraints {
    /// Builds constraints from the two enable flags.
    #[must_use]
    pub fn from_flags(video: bool, audio: bool) -> Self {
        Self {
            video: video.then(VideoConstraints::default),
            audio: audio.then(AudioConstraints::default),
        }
    }

    /// Whether no track is requested.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// Encoder settings passed when recording starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    /// Container/codec to request.
    pub mime_type: String,
    /// Video bitrate; `None` when video is disabled.
    pub video_bits_per_second: Option<u32>,
    /// Audio bitrate.
    pub audio_bits_per_second: u32,
    /// Interval between data chunks.
    pub timeslice: Duration,
}

/// Receives encoded chunks as the platform produces them.
pub type ChunkSink = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Acquires capture streams.
pub trait MediaCapture: Send + Sync {
    /// Whether the encoder can produce `mime_type`.
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Opens device tracks. Fails with `PermissionDenied` when refused.
    fn open(&self, constraints: &CaptureConstraints) -> crate::Result<Box<dyn CaptureStream>>;
}

/// An open device stream with an attached encoder.
pub trait CaptureStream: Send {
    /// Starts encoding; chunks are pushed to `sink` every `options.timeslice`.
    fn start(&mut self, options: &RecorderOptions, sink: ChunkSink) -> crate::Result<()>;

    /// MIME type the encoder actually negotiated.
    fn mime_type(&self) -> Option<String>;

    /// Pushes whatever is buffered to the sink immediately.
    fn request_data(&mut self) -> crate::Result<()>;

    /// Stops encoding. All pending chunks reach the sink before this returns.
    fn stop(&mut self) -> crate::Result<()>;

    /// Stops every device track (camera light off, microphone released).
    fn release_tracks(&mut self);
}

//! Device platform seams.
//!
//! Camera/microphone capture, geolocation and telephony are owned by the host
//! platform. Haven only talks to them through the traits in this module so a
//! mobile shell, a desktop build or a test harness can supply its own.
//!
//! # Implementations
//!
//! | Trait | Shipped implementations |
//! |-------|-------------------------|
//! | [`GeolocationProvider`] | [`StaticGeolocation`] (fixed or scripted fixes) |
//! | [`MediaCapture`] | [`SimulatedCapture`] (synthetic chunks) |
//! | [`Telephony`] | [`SystemTelephony`] (OS URI opener) |

mod capture;
mod geolocation;
mod simulated;
mod telephony;

pub use capture::{
    AudioConstraints, CaptureConstraints, CaptureStream, ChunkSink, FacingMode, MediaCapture,
    RecorderOptions, VideoConstraints,
};
pub use geolocation::{FixCallback, GeolocationProvider, PositionOptions, WatchId};
pub use simulated::{SimulatedCapture, StaticGeolocation};
pub use telephony::{SystemTelephony, Telephony, tel_uri};

use std::sync::Arc;

/// The set of platform capabilities a session needs.
#[derive(Clone)]
pub struct Platform {
    /// Position source.
    pub geolocation: Arc<dyn GeolocationProvider>,
    /// Camera and microphone.
    pub capture: Arc<dyn MediaCapture>,
    /// Call handoff.
    pub telephony: Arc<dyn Telephony>,
}

impl Platform {
    /// A fully simulated platform fixed at `location`, for drills and tests.
    #[must_use]
    pub fn simulated(location: crate::Location) -> Self {
        Self {
            geolocation: Arc::new(StaticGeolocation::fixed(location)),
            capture: Arc::new(SimulatedCapture::new()),
            telephony: Arc::new(SystemTelephony::dry_run()),
        }
    }
}

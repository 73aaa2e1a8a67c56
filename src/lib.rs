//! Sensor Logger - synchronized camera, depth, IMU and GPS recording.
//!
//! Samples from independent producers are recorded into one session
//! directory: a line-delimited JSON journal, 16-bit depth images and an
//! H.264 color track.

pub mod capture;
pub mod depth;
pub mod journal;
pub mod recorder;
pub mod utils;
pub mod video;

pub use recorder::{RecordingConfig, RecordingCoordinator, RecordingEvent, RecordingSummary};
pub use utils::{LoggerError, LoggerResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to debug output for this crate.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sensor_logger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

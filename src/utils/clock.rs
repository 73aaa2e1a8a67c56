//! Time bases
//!
//! Record times are seconds on a monotonic clock so samples from different
//! producers compare directly. Session names use local wall-clock time.

use chrono::{DateTime, Local};
use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed on the process-wide monotonic clock
pub fn monotonic_seconds() -> f64 {
    EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// Directory name for a session started at `at` (`yyyyMMdd_HHmmss`)
pub fn session_dir_name(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

//! Recording state management
//!
//! Defines the recording state machine, configuration and session results.

use crate::utils::{LoggerError, LoggerResult};
use crate::video::{FrameSize, VideoConfig};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Current state of the recording system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
}

/// Which streams are logged while recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSelection {
    /// Accelerometer and gyroscope
    pub imu: bool,
    /// Location fixes
    pub gps: bool,
    /// Color and depth frame pairs
    pub camera: bool,
}

impl Default for StreamSelection {
    fn default() -> Self {
        Self {
            imu: true,
            gps: true,
            camera: true,
        }
    }
}

/// Configuration for a recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    pub streams: StreamSelection,

    /// Size of the color video track; taken from the first frame when unset
    pub frame_size: Option<FrameSize>,

    /// Color resolution divided by depth resolution
    pub depth_to_color_ratio: f64,

    /// Largest color/depth capture time difference accepted as a pair
    pub max_frame_skew_s: f64,

    /// Samples buffered between producers and the recorder
    pub control_queue_capacity: usize,

    pub video: VideoConfig,

    /// Remove session directories that recorded nothing
    pub prune_empty_sessions: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            streams: StreamSelection::default(),
            frame_size: None,
            // Measured on the reference device; confirm for other sensor pairs
            depth_to_color_ratio: 6.0,
            max_frame_skew_s: 1.0 / 30.0,
            control_queue_capacity: 1024,
            video: VideoConfig::default(),
            prune_empty_sessions: true,
        }
    }
}

impl RecordingConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn load(path: &Path) -> LoggerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LoggerResult<()> {
        if !self.depth_to_color_ratio.is_finite() || self.depth_to_color_ratio <= 0.0 {
            return Err(LoggerError::Config(format!(
                "depthToColorRatio must be positive, got {}",
                self.depth_to_color_ratio
            )));
        }
        if !self.max_frame_skew_s.is_finite() || self.max_frame_skew_s <= 0.0 {
            return Err(LoggerError::Config(format!(
                "maxFrameSkewS must be positive, got {}",
                self.max_frame_skew_s
            )));
        }
        if self.control_queue_capacity == 0 {
            return Err(LoggerError::Config(
                "controlQueueCapacity must be at least 1".to_string(),
            ));
        }
        if self.video.fps == 0 {
            return Err(LoggerError::Config("video.fps must be at least 1".to_string()));
        }
        if let Some(size) = self.frame_size {
            FrameSize::new(size.width, size.height)?;
        }
        Ok(())
    }
}

/// Identity of an active session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub dir: PathBuf,
    pub started_at: DateTime<Local>,
}

/// Result of a completed session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub session_id: Uuid,

    /// Session directory; it no longer exists if `pruned`
    pub dir: PathBuf,

    pub records_written: u64,
    pub write_failures: u64,

    /// Frame sets written to the journal
    pub frames_logged: u64,

    pub depth_images_written: u64,
    pub depth_images_failed: u64,

    /// Depth samples stored as invalid because they did not fit in 16 bits
    pub depth_samples_out_of_range: u64,

    /// Capture bundles with a missing, dropped or mistimed side
    pub bundles_discarded: u64,

    pub video_frames_accepted: u64,
    pub video_frames_dropped: u64,

    /// True if the directory was removed because nothing was recorded
    pub pruned: bool,
}

impl RecordingSummary {
    pub fn is_empty(&self) -> bool {
        self.records_written == 0
            && self.depth_images_written == 0
            && self.video_frames_accepted == 0
    }
}

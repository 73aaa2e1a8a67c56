//! Video track types and configuration

use crate::utils::{LoggerError, LoggerResult};
use serde::{Deserialize, Serialize};

/// Dimensions of the encoded color track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> LoggerResult<Self> {
        if width == 0 || height == 0 {
            return Err(LoggerError::Config(format!(
                "Frame size {}x{} has a zero dimension",
                width, height
            )));
        }
        Ok(Self { width, height })
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Mov,
    Mp4,
}

impl Container {
    /// Get the file extension for this container
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mov => "mov",
            Container::Mp4 => "mp4",
        }
    }
}

/// Encoder settings for the color track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConfig {
    /// Set to false to record journal and depth images only
    pub enabled: bool,

    pub container: Container,

    /// Nominal rate handed to the encoder; real timing is in the timecodes sidecar
    pub fps: u32,

    /// H.264 constant rate factor
    pub crf: u8,

    /// x264 preset
    pub preset: String,

    /// Frames buffered ahead of the encoder before new frames are dropped
    pub queue_depth: usize,

    /// FFmpeg executable, looked up on PATH by default
    pub ffmpeg_path: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            container: Container::Mov,
            fps: 30,
            crf: 18,
            preset: "veryfast".to_string(),
            queue_depth: 8,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_size_rejects_zero() {
        assert!(FrameSize::new(0, 480).is_err());
        assert!(FrameSize::new(640, 0).is_err());
        assert_eq!(FrameSize::new(640, 480).unwrap().to_string(), "640x480");
    }

    #[test]
    fn test_partial_video_config() {
        let config: VideoConfig = serde_json::from_str(r#"{"container":"mp4","crf":23}"#).unwrap();
        assert_eq!(config.container.extension(), "mp4");
        assert_eq!(config.crf, 23);
        assert_eq!(config.fps, 30);
        assert!(config.enabled);
    }
}

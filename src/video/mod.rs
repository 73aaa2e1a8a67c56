//! Color video track
//!
//! - `VideoSink` state machine over a pluggable `VideoEncoder`
//! - FFmpeg backend writing `data.mov` / `data.mp4` plus a timecodes sidecar

pub mod ffmpeg;
pub mod sink;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};
pub use sink::{AppendOutcome, EncoderFactory, SinkState, SinkStats, Submission, VideoEncoder, VideoSink};
pub use types::{Container, FrameSize, VideoConfig};

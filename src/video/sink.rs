//! Color track sink
//!
//! Wraps an encoder behind a small state machine. Appends never block: when
//! the encoder is busy the frame is dropped and counted.

use super::types::FrameSize;
use crate::capture::traits::{ColorFrame, PixelFormat};
use crate::utils::{LoggerError, LoggerResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::oneshot;

/// Result of offering a frame to an encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// The encoder's queue is full; the frame was not taken
    Busy,
}

/// A video encoder accepting raw frames with presentation times
pub trait VideoEncoder: Send {
    /// Offer one frame without blocking
    fn try_submit(&mut self, data: Vec<u8>, pts: Duration) -> LoggerResult<Submission>;

    /// Flush and close the output, blocking until the file is complete
    fn finalize(self: Box<Self>) -> LoggerResult<PathBuf>;
}

/// Creates encoders for new video tracks
pub trait EncoderFactory: Send + Sync {
    fn create(
        &self,
        path: &Path,
        size: FrameSize,
        format: PixelFormat,
    ) -> LoggerResult<Box<dyn VideoEncoder>>;
}

/// Lifecycle of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Uninitialized,
    Writing,
    Finished,
}

/// What happened to an appended frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted { frame_number: u64 },
    /// Encoder busy, frame dropped
    NotReady,
    /// Frame did not match the track, dropped
    Rejected,
    /// The encoder errored and will not take more frames
    Failed,
    /// Sink is not writing
    Inactive,
}

/// Counters for the summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub accepted: u64,
    pub dropped_busy: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// One color track written to a container file
///
/// Frames are timed relative to the first accepted one. The FFmpeg encoder
/// writes the container at a constant nominal rate; the real presentation
/// times go to the `.timecodes.txt` sidecar next to it, which is what a
/// replay should read.
pub struct VideoSink {
    path: PathBuf,
    size: FrameSize,
    format: PixelFormat,
    state: SinkState,
    encoder: Option<Box<dyn VideoEncoder>>,
    origin: Option<f64>,
    stats: SinkStats,
}

impl VideoSink {
    pub fn new(path: &Path, size: FrameSize, format: PixelFormat) -> Self {
        Self {
            path: path.to_path_buf(),
            size,
            format,
            state: SinkState::Uninitialized,
            encoder: None,
            origin: None,
            stats: SinkStats::default(),
        }
    }

    /// Create and start a sink in one step
    pub fn open(
        factory: &dyn EncoderFactory,
        path: &Path,
        size: FrameSize,
        format: PixelFormat,
    ) -> LoggerResult<Self> {
        let mut sink = Self::new(path, size, format);
        sink.start(factory)?;
        Ok(sink)
    }

    /// Move from `Uninitialized` to `Writing`.
    ///
    /// Encoder creation failures are reported as `Config`.
    pub fn start(&mut self, factory: &dyn EncoderFactory) -> LoggerResult<()> {
        if self.state != SinkState::Uninitialized {
            return Err(LoggerError::Config(format!(
                "Video sink {:?} already started",
                self.path
            )));
        }

        let encoder = factory
            .create(&self.path, self.size, self.format)
            .map_err(|e| match e {
                LoggerError::Config(_) => e,
                other => LoggerError::Config(other.to_string()),
            })?;

        tracing::info!("Video track {:?} writing at {}", self.path, self.size);
        self.encoder = Some(encoder);
        self.state = SinkState::Writing;
        Ok(())
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Index the next accepted frame will get
    pub fn frame_number(&self) -> u64 {
        self.stats.accepted
    }

    /// Offer a color frame captured at `timestamp` (monotonic seconds).
    ///
    /// The first accepted frame defines time zero for the track.
    pub fn append_frame(&mut self, frame: ColorFrame, timestamp: f64) -> AppendOutcome {
        let Some(encoder) = self.encoder.as_mut() else {
            return AppendOutcome::Inactive;
        };

        if frame.width != self.size.width
            || frame.height != self.size.height
            || frame.format != self.format
            || frame.data.len() != frame.expected_len()
        {
            self.stats.rejected += 1;
            tracing::warn!(
                "Dropping {}x{} {:?} frame for {} {:?} track",
                frame.width,
                frame.height,
                frame.format,
                self.size,
                self.format
            );
            return AppendOutcome::Rejected;
        }

        let origin = self.origin.unwrap_or(timestamp);
        let pts = Duration::from_secs_f64((timestamp - origin).max(0.0));

        match encoder.try_submit(frame.data, pts) {
            Ok(Submission::Queued) => {
                self.origin = Some(origin);
                let frame_number = self.stats.accepted;
                self.stats.accepted += 1;
                AppendOutcome::Accepted { frame_number }
            }
            Ok(Submission::Busy) => {
                self.stats.dropped_busy += 1;
                tracing::debug!("Video encoder busy, dropping frame at t={:.4}", timestamp);
                AppendOutcome::NotReady
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!("Video encoder refused frame: {}", e);
                AppendOutcome::Failed
            }
        }
    }

    /// Stop accepting frames and finalize the file on a background thread.
    ///
    /// The receiver yields the output path, or `None` if nothing was written
    /// or finalization failed. Dropping the receiver is fine.
    pub fn finish(&mut self) -> oneshot::Receiver<Option<PathBuf>> {
        let (tx, rx) = oneshot::channel();
        self.state = SinkState::Finished;

        let Some(encoder) = self.encoder.take() else {
            let _ = tx.send(None);
            return rx;
        };

        let path = self.path.clone();
        let accepted = self.stats.accepted;
        let spawned = std::thread::Builder::new()
            .name("video-finalize".to_string())
            .spawn(move || {
                let result = match encoder.finalize() {
                    Ok(path) => {
                        tracing::info!("Video finished: {} frames, output: {:?}", accepted, path);
                        Some(path)
                    }
                    Err(e) => {
                        tracing::error!("Failed to finalize video {:?}: {}", path, e);
                        None
                    }
                };
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            // tx moved into the closure and dropped with it; the receiver sees a closed channel
            tracing::error!("Failed to spawn video finalizer: {}", e);
        }
        rx
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            tracing::warn!("Video sink {:?} dropped without finish", self.path);
            let _ = self.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::Intrinsics;
    use crate::video::testing::MemoryEncoderFactory;

    fn frame(width: u32, height: u32) -> ColorFrame {
        ColorFrame {
            timestamp: 0.0,
            width,
            height,
            format: PixelFormat::Bgra8,
            data: vec![0; (width * height * 4) as usize],
            exposure_time_s: None,
            intrinsics: Intrinsics {
                focal_length_x: 1.0,
                focal_length_y: 1.0,
                principal_point_x: 0.0,
                principal_point_y: 0.0,
            },
        }
    }

    fn size() -> FrameSize {
        FrameSize::new(4, 2).unwrap()
    }

    #[tokio::test]
    async fn test_first_frame_is_time_zero() {
        let factory = MemoryEncoderFactory::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.mov");
        let mut sink = VideoSink::open(&factory, &path, size(), PixelFormat::Bgra8).unwrap();

        assert_eq!(sink.frame_number(), 0);
        assert_eq!(
            sink.append_frame(frame(4, 2), 10.0),
            AppendOutcome::Accepted { frame_number: 0 }
        );
        assert_eq!(
            sink.append_frame(frame(4, 2), 10.5),
            AppendOutcome::Accepted { frame_number: 1 }
        );
        assert_eq!(factory.accepted_pts(), vec![0.0, 0.5]);

        let finished = sink.finish().await.unwrap();
        assert_eq!(finished, Some(path));
        assert_eq!(sink.state(), SinkState::Finished);
        assert_eq!(sink.append_frame(frame(4, 2), 11.0), AppendOutcome::Inactive);
    }

    #[test]
    fn test_busy_encoder_drops_without_counting() {
        let factory = MemoryEncoderFactory::busy_every(2);
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            VideoSink::open(&factory, &dir.path().join("data.mov"), size(), PixelFormat::Bgra8)
                .unwrap();

        assert!(matches!(sink.append_frame(frame(4, 2), 1.0), AppendOutcome::Accepted { .. }));
        assert_eq!(sink.append_frame(frame(4, 2), 1.1), AppendOutcome::NotReady);
        assert_eq!(sink.frame_number(), 1);
        assert_eq!(
            sink.append_frame(frame(4, 2), 1.2),
            AppendOutcome::Accepted { frame_number: 1 }
        );
        assert_eq!(sink.stats().dropped_busy, 1);
        let _ = sink.finish();
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let factory = MemoryEncoderFactory::new();
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            VideoSink::open(&factory, &dir.path().join("data.mov"), size(), PixelFormat::Bgra8)
                .unwrap();

        assert_eq!(sink.append_frame(frame(8, 2), 1.0), AppendOutcome::Rejected);
        assert_eq!(sink.frame_number(), 0);
        assert!(factory.accepted_pts().is_empty());
        let _ = sink.finish();
    }

    #[test]
    fn test_encoder_error_is_failed() {
        let factory = MemoryEncoderFactory::closing_after(1);
        let dir = tempfile::tempdir().unwrap();
        let mut sink =
            VideoSink::open(&factory, &dir.path().join("data.mov"), size(), PixelFormat::Bgra8)
                .unwrap();

        assert!(matches!(sink.append_frame(frame(4, 2), 1.0), AppendOutcome::Accepted { .. }));
        assert_eq!(sink.append_frame(frame(4, 2), 1.1), AppendOutcome::Failed);
        assert_eq!(sink.frame_number(), 1);
        assert_eq!(sink.stats().failed, 1);
        assert_eq!(sink.stats().rejected, 0);
        let _ = sink.finish();
    }

    #[test]
    fn test_uninitialized_sink_is_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoSink::new(&dir.path().join("data.mov"), size(), PixelFormat::Bgra8);
        assert_eq!(sink.state(), SinkState::Uninitialized);
        assert_eq!(sink.append_frame(frame(4, 2), 1.0), AppendOutcome::Inactive);
    }

    #[test]
    fn test_factory_failure_is_config_error() {
        let factory = MemoryEncoderFactory::failing();
        let dir = tempfile::tempdir().unwrap();
        let err = VideoSink::open(&factory, &dir.path().join("data.mov"), size(), PixelFormat::Bgra8)
            .err()
            .unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_finish_without_frames_started() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoSink::new(&dir.path().join("data.mov"), size(), PixelFormat::Bgra8);
        assert_eq!(sink.finish().await.unwrap(), None);
    }
}

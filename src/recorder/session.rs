//! Recording session
//!
//! One session owns one directory:
//!
//! ```text
//! <base>/<yyyyMMdd_HHmmss>/
//!     data.jsonl          journal
//!     frames2/%08d.png    depth images
//!     data.mov            color track
//!     data.timecodes.txt  color presentation times
//! ```

use super::frames::DepthFrameWriter;
use super::state::{RecordingConfig, RecordingSummary, SessionInfo};
use crate::capture::sync::SynchronizedFramePair;
use crate::capture::traits::{ColorFrame, ImuReading, LocationFix};
use crate::journal::{FrameDescriptor, JournalWriter, Record};
use crate::utils::{session_dir_name, LoggerError, LoggerResult};
use crate::video::{AppendOutcome, EncoderFactory, FrameSize, SinkStats, VideoSink};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use uuid::Uuid;

pub const JOURNAL_FILE: &str = "data.jsonl";
pub const DEPTH_DIR: &str = "frames2";

/// Pending video completion of a closed session
pub type VideoCompletion = oneshot::Receiver<Option<PathBuf>>;

enum VideoTrack {
    /// Opens on the first frame pair
    Pending,
    Active(VideoSink),
    /// Stopped taking frames mid-session; the file written so far is kept
    Retired {
        stats: SinkStats,
        completion: VideoCompletion,
    },
    Disabled,
}

/// An active recording run and everything it writes
pub struct Session {
    info: SessionInfo,
    config: RecordingConfig,
    journal: JournalWriter,
    depth: Option<DepthFrameWriter>,
    video: VideoTrack,
    /// Frame numbers when there is no video track to take them from
    frame_counter: u64,
    frames_logged: u64,
}

/// Pick a directory under `base` named after `now` that is free to use
fn choose_session_dir(base: &Path, now: DateTime<Local>) -> PathBuf {
    let name = session_dir_name(now);
    let mut candidate = base.join(&name);
    let mut suffix = 1;
    while !is_free(&candidate) {
        candidate = base.join(format!("{}_{}", name, suffix));
        suffix += 1;
    }
    candidate
}

fn is_free(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !dir.exists(),
    }
}

impl Session {
    /// Create the session directory and open the journal.
    ///
    /// Nothing is left on disk when this fails.
    pub fn create(base: &Path, now: DateTime<Local>, config: &RecordingConfig) -> LoggerResult<Self> {
        let dir = choose_session_dir(base, now);

        std::fs::create_dir_all(&dir).map_err(|source| LoggerError::DirectoryCreation {
            path: dir.clone(),
            source,
        })?;

        match Self::open_writers(&dir, config) {
            Ok((journal, depth)) => {
                let info = SessionInfo {
                    id: Uuid::new_v4(),
                    dir,
                    started_at: now,
                };
                tracing::info!("Creating log in {:?} (session {})", info.dir, info.id);
                Ok(Self {
                    info,
                    config: config.clone(),
                    journal,
                    depth,
                    video: if config.video.enabled {
                        VideoTrack::Pending
                    } else {
                        VideoTrack::Disabled
                    },
                    frame_counter: 0,
                    frames_logged: 0,
                })
            }
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to remove partial session {:?}: {}", dir, cleanup);
                }
                Err(e)
            }
        }
    }

    fn open_writers(
        dir: &Path,
        config: &RecordingConfig,
    ) -> LoggerResult<(JournalWriter, Option<DepthFrameWriter>)> {
        let depth = if config.streams.camera {
            let depth_dir = dir.join(DEPTH_DIR);
            std::fs::create_dir(&depth_dir).map_err(|source| LoggerError::DirectoryCreation {
                path: depth_dir.clone(),
                source,
            })?;
            Some(DepthFrameWriter::spawn(&depth_dir)?)
        } else {
            None
        };

        let journal = JournalWriter::open(&dir.join(JOURNAL_FILE))?;
        Ok((journal, depth))
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn video_path(&self) -> PathBuf {
        self.info
            .dir
            .join(format!("data.{}", self.config.video.container.extension()))
    }

    fn append(&self, record: Record) -> bool {
        match self.journal.append(record) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Journal append failed: {}", e);
                false
            }
        }
    }

    pub fn log_imu(&self, reading: &ImuReading) {
        self.append(Record::imu(reading));
    }

    pub fn log_location(&self, fix: &LocationFix) {
        self.append(Record::gps(fix));
    }

    /// Open the video track on the first frame if it is still pending.
    ///
    /// A failure disables the track for the rest of the session and is
    /// returned for reporting; logging continues without video.
    pub fn ensure_video(
        &mut self,
        factory: &dyn EncoderFactory,
        first: &ColorFrame,
    ) -> Option<LoggerError> {
        if !matches!(self.video, VideoTrack::Pending) {
            return None;
        }

        let size = match self.config.frame_size {
            Some(size) => Ok(size),
            None => FrameSize::new(first.width, first.height),
        };
        let opened = size.and_then(|size| VideoSink::open(factory, &self.video_path(), size, first.format));

        match opened {
            Ok(sink) => {
                self.video = VideoTrack::Active(sink);
                None
            }
            Err(e) => {
                tracing::error!("Video track disabled, continuing without video: {}", e);
                self.video = VideoTrack::Disabled;
                Some(e)
            }
        }
    }

    /// Number the next frame set will carry
    pub fn next_frame_number(&self) -> u64 {
        match &self.video {
            VideoTrack::Active(sink) => sink.frame_number(),
            _ => self.frame_counter,
        }
    }

    /// Journal a frame pair, queue its depth image and feed the color track.
    ///
    /// Returns an error when the color track had to be retired; logging
    /// goes on without it.
    pub fn log_frame_pair(&mut self, pair: SynchronizedFramePair) -> Option<LoggerError> {
        let SynchronizedFramePair { color, depth } = pair;
        let frame_number = self.next_frame_number();

        let descriptors = vec![
            FrameDescriptor::color(&color),
            FrameDescriptor::depth(
                depth.timestamp,
                &color.intrinsics,
                self.config.depth_to_color_ratio,
            ),
        ];
        if self.append(Record::frame_set(color.timestamp, frame_number, descriptors)) {
            self.frames_logged += 1;
        }

        if let Some(writer) = &self.depth {
            if let Err(e) = writer.submit(frame_number, depth.buffer) {
                tracing::warn!("Depth frame {} not queued: {}", frame_number, e);
            }
        }

        let (width, height) = (color.width, color.height);
        let outcome = match &mut self.video {
            VideoTrack::Active(sink) => {
                let timestamp = color.timestamp;
                sink.append_frame(color, timestamp)
            }
            _ => {
                self.frame_counter += 1;
                return None;
            }
        };

        let reason = match outcome {
            AppendOutcome::Accepted { .. } | AppendOutcome::NotReady => return None,
            AppendOutcome::Rejected => format!(
                "{}x{} color frame does not fit the video track",
                width, height
            ),
            AppendOutcome::Failed | AppendOutcome::Inactive => {
                "video encoder stopped accepting frames".to_string()
            }
        };
        Some(self.retire_video(frame_number, reason))
    }

    /// Finish the color track early and number later frames on our own
    fn retire_video(&mut self, frame_number: u64, reason: String) -> LoggerError {
        if let VideoTrack::Active(mut sink) = std::mem::replace(&mut self.video, VideoTrack::Disabled) {
            self.video = VideoTrack::Retired {
                stats: sink.stats(),
                completion: sink.finish(),
            };
        }
        // Frame numbers stay unique so depth images are never overwritten
        self.frame_counter = frame_number + 1;

        tracing::error!(
            "Video track retired after frame {}, continuing without video: {}",
            frame_number,
            reason
        );
        LoggerError::Config(reason)
    }

    /// Stop every writer, draining queued work.
    ///
    /// Returns the summary and, if a video track was written, a receiver
    /// for its completion.
    pub async fn close(mut self) -> (RecordingSummary, Option<VideoCompletion>) {
        let mut summary = RecordingSummary {
            session_id: self.info.id,
            dir: self.info.dir.clone(),
            frames_logged: self.frames_logged,
            ..RecordingSummary::default()
        };

        let (stats, mut completion) = match std::mem::replace(&mut self.video, VideoTrack::Disabled) {
            VideoTrack::Active(mut sink) => (sink.stats(), Some(sink.finish())),
            VideoTrack::Retired { stats, completion } => (stats, Some(completion)),
            VideoTrack::Pending | VideoTrack::Disabled => (SinkStats::default(), None),
        };
        summary.video_frames_accepted = stats.accepted;
        summary.video_frames_dropped = stats.dropped_busy + stats.rejected + stats.failed;

        match self.journal.close().await {
            Ok(stats) => {
                summary.records_written = stats.records_written;
                summary.write_failures = stats.write_failures;
            }
            Err(e) => tracing::error!("Failed to close journal: {}", e),
        }

        if let Some(mut writer) = self.depth.take() {
            match writer.close().await {
                Ok(stats) => {
                    summary.depth_images_written = stats.written;
                    summary.depth_images_failed = stats.failed;
                    summary.depth_samples_out_of_range = stats.out_of_range_samples;
                }
                Err(e) => tracing::error!("Failed to close depth writer: {}", e),
            }
        }

        if self.config.prune_empty_sessions && summary.is_empty() {
            // Let an empty encoder finish before its directory goes away
            if let Some(rx) = completion.take() {
                let _ = rx.await;
            }
            match std::fs::remove_dir_all(&self.info.dir) {
                Ok(()) => {
                    summary.pruned = true;
                    tracing::info!("Removed empty session {:?}", self.info.dir);
                }
                Err(e) => tracing::warn!("Failed to remove empty session {:?}: {}", self.info.dir, e),
            }
        }

        tracing::info!(
            "Closing log in {:?}: {} records, {} frame sets, {} depth images, {} video frames",
            self.info.dir,
            summary.records_written,
            summary.frames_logged,
            summary.depth_images_written,
            summary.video_frames_accepted
        );

        (summary, completion)
    }
}

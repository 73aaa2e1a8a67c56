//! In-memory encoder for tests

use super::sink::{EncoderFactory, Submission, VideoEncoder};
use super::types::FrameSize;
use crate::capture::traits::PixelFormat;
use crate::utils::{LoggerError, LoggerResult};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Records the presentation time of every frame its encoders accept
#[derive(Clone, Default)]
pub struct MemoryEncoderFactory {
    accepted: Arc<Mutex<Vec<f64>>>,
    busy_every: Option<u64>,
    close_after: Option<u64>,
    fail: bool,
}

impl MemoryEncoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `n`th submission reports `Busy`
    pub fn busy_every(n: u64) -> Self {
        Self {
            busy_every: Some(n),
            ..Self::default()
        }
    }

    /// Encoders error on every submission after `n` accepted frames, like an
    /// FFmpeg child that exited mid-session
    pub fn closing_after(n: u64) -> Self {
        Self {
            close_after: Some(n),
            ..Self::default()
        }
    }

    /// Encoder creation always fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Accepted presentation times in seconds
    pub fn accepted_pts(&self) -> Vec<f64> {
        self.accepted.lock().clone()
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn create(
        &self,
        path: &Path,
        _size: FrameSize,
        _format: PixelFormat,
    ) -> LoggerResult<Box<dyn VideoEncoder>> {
        if self.fail {
            return Err(LoggerError::Config("encoder unavailable".to_string()));
        }
        Ok(Box::new(MemoryEncoder {
            path: path.to_path_buf(),
            accepted: Arc::clone(&self.accepted),
            busy_every: self.busy_every,
            close_after: self.close_after,
            submissions: 0,
            queued: 0,
        }))
    }
}

struct MemoryEncoder {
    path: PathBuf,
    accepted: Arc<Mutex<Vec<f64>>>,
    busy_every: Option<u64>,
    close_after: Option<u64>,
    submissions: u64,
    queued: u64,
}

impl VideoEncoder for MemoryEncoder {
    fn try_submit(&mut self, _data: Vec<u8>, pts: Duration) -> LoggerResult<Submission> {
        if self.close_after.is_some_and(|n| self.queued >= n) {
            return Err(LoggerError::Closed(self.path.display().to_string()));
        }
        self.submissions += 1;
        if let Some(n) = self.busy_every {
            if self.submissions % n == 0 {
                return Ok(Submission::Busy);
            }
        }
        self.queued += 1;
        self.accepted.lock().push(pts.as_secs_f64());
        Ok(Submission::Queued)
    }

    fn finalize(self: Box<Self>) -> LoggerResult<PathBuf> {
        std::fs::write(&self.path, b"")?;
        Ok(self.path)
    }
}

//! Depth image writer
//!
//! Converts and encodes depth frames on a dedicated thread so neither the
//! control loop nor the camera callback waits on PNG compression.

use crate::capture::traits::DepthPixelBuffer;
use crate::depth;
use crate::utils::{LoggerError, LoggerResult};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::sync::oneshot;

/// File name of the depth image for a frame number
pub fn depth_image_name(frame_number: u64) -> String {
    format!("{:08}.png", frame_number)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepthWriterStats {
    pub written: u64,
    pub failed: u64,
    /// Samples stored as invalid because they were out of range
    pub out_of_range_samples: u64,
}

enum DepthJob {
    Write { frame_number: u64, buffer: DepthPixelBuffer },
    Close(oneshot::Sender<DepthWriterStats>),
}

/// Handle to the depth image thread of one session
pub struct DepthFrameWriter {
    dir: PathBuf,
    tx: Option<mpsc::Sender<DepthJob>>,
}

impl DepthFrameWriter {
    /// Start a writer producing images in `dir`, which must exist
    pub fn spawn(dir: &Path) -> LoggerResult<Self> {
        let (tx, rx) = mpsc::channel();
        let thread_dir = dir.to_path_buf();
        std::thread::Builder::new()
            .name("depth-writer".to_string())
            .spawn(move || run_writer(thread_dir, rx))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            tx: Some(tx),
        })
    }

    /// Queue a depth frame; the buffer is consumed by the conversion
    pub fn submit(&self, frame_number: u64, buffer: DepthPixelBuffer) -> LoggerResult<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(LoggerError::Closed(self.dir.display().to_string()));
        };
        tx.send(DepthJob::Write {
            frame_number,
            buffer,
        })
        .map_err(|_| LoggerError::Closed(self.dir.display().to_string()))
    }

    /// Finish every queued image and stop the thread
    pub async fn close(&mut self) -> LoggerResult<DepthWriterStats> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| LoggerError::Closed(self.dir.display().to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(DepthJob::Close(reply_tx))
            .map_err(|_| LoggerError::Closed(self.dir.display().to_string()))?;
        reply_rx
            .await
            .map_err(|_| LoggerError::Closed(self.dir.display().to_string()))
    }
}

fn write_one(dir: &Path, frame_number: u64, buffer: DepthPixelBuffer) -> LoggerResult<usize> {
    let grid = depth::convert(buffer);
    depth::encode(&grid, &dir.join(depth_image_name(frame_number)))?;
    Ok(grid.out_of_range)
}

fn run_writer(dir: PathBuf, rx: mpsc::Receiver<DepthJob>) {
    let mut stats = DepthWriterStats::default();

    while let Ok(job) = rx.recv() {
        match job {
            DepthJob::Write {
                frame_number,
                buffer,
            } => match write_one(&dir, frame_number, buffer) {
                Ok(out_of_range) => {
                    stats.written += 1;
                    if out_of_range > 0 {
                        stats.out_of_range_samples += out_of_range as u64;
                        tracing::warn!(
                            "Depth frame {} had {} samples out of range",
                            frame_number,
                            out_of_range
                        );
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("Failed to write depth frame {}: {}", frame_number, e);
                }
            },
            DepthJob::Close(reply) => {
                tracing::info!(
                    "Depth writer for {:?} closed: {} written, {} failed",
                    dir,
                    stats.written,
                    stats.failed
                );
                let _ = reply.send(stats);
                return;
            }
        }
    }
}

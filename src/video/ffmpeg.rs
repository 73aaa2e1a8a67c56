//! FFmpeg encoder backend
//!
//! Raw frames are piped to an `ffmpeg` child process that encodes H.264.
//! A feeder thread owns the child's stdin behind a bounded queue, so a slow
//! encoder shows up as `Busy` instead of stalling the caller. Raw video has
//! no timestamps, so presentation times are written to a timecode v2
//! sidecar next to the container.

use super::sink::{EncoderFactory, Submission, VideoEncoder};
use super::types::{Container, FrameSize, VideoConfig};
use crate::capture::traits::PixelFormat;
use crate::utils::{LoggerError, LoggerResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Timecode sidecar path for a container path (`data.mov` -> `data.timecodes.txt`)
pub fn timecodes_path(video_path: &Path) -> PathBuf {
    video_path.with_extension("timecodes.txt")
}

/// Check that the configured FFmpeg binary runs
pub fn ffmpeg_available(ffmpeg_path: &str) -> bool {
    Command::new(ffmpeg_path)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Creates [`FfmpegEncoder`]s from a [`VideoConfig`]
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    config: VideoConfig,
}

impl FfmpegEncoderFactory {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn create(
        &self,
        path: &Path,
        size: FrameSize,
        format: PixelFormat,
    ) -> LoggerResult<Box<dyn VideoEncoder>> {
        let encoder = FfmpegEncoder::spawn(&self.config, path, size, format)?;
        Ok(Box::new(encoder))
    }
}

/// Build the FFmpeg argument list for a raw-video-over-stdin encode
fn encoder_args(
    config: &VideoConfig,
    output: &Path,
    size: FrameSize,
    format: PixelFormat,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        format.ffmpeg_name().into(),
        "-s".into(),
        size.to_string(),
        "-r".into(),
        config.fps.to_string(),
        "-i".into(),
        "-".into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        config.preset.clone(),
        "-crf".into(),
        config.crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
    ];

    if config.container == Container::Mp4 {
        args.push("-movflags".into());
        args.push("+faststart".into());
    }

    args.push(output.to_string_lossy().to_string());
    args
}

/// H.264 encoder running in an `ffmpeg` child process
pub struct FfmpegEncoder {
    tx: Option<SyncSender<(Vec<u8>, Duration)>>,
    feeder: Option<JoinHandle<LoggerResult<PathBuf>>>,
}

impl FfmpegEncoder {
    pub fn spawn(
        config: &VideoConfig,
        output: &Path,
        size: FrameSize,
        format: PixelFormat,
    ) -> LoggerResult<Self> {
        if !ffmpeg_available(&config.ffmpeg_path) {
            return Err(LoggerError::Config(format!(
                "FFmpeg not found at '{}'. Please install FFmpeg.",
                config.ffmpeg_path
            )));
        }

        // yuv420p subsamples chroma 2x2
        if size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(LoggerError::Config(format!(
                "Frame size {} must have even dimensions for yuv420p",
                size
            )));
        }

        let timecodes = File::create(timecodes_path(output))
            .map_err(|e| LoggerError::Config(format!("Cannot create timecodes file: {}", e)))?;

        let mut process = Command::new(&config.ffmpeg_path)
            .args(encoder_args(config, output, size, format))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LoggerError::Config(format!("Failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| LoggerError::Config("Failed to capture FFmpeg stdin".to_string()))?;

        tracing::info!(
            "Started FFmpeg encoder: {} @ {}fps, pixel_format={}, output: {:?}",
            size,
            config.fps,
            format.ffmpeg_name(),
            output
        );

        let (tx, rx) = mpsc::sync_channel(config.queue_depth.max(1));
        let output = output.to_path_buf();
        let feeder = std::thread::Builder::new()
            .name("ffmpeg-feeder".to_string())
            .spawn(move || feed(process, stdin, rx, BufWriter::new(timecodes), output))?;

        Ok(Self {
            tx: Some(tx),
            feeder: Some(feeder),
        })
    }
}

fn feed(
    process: Child,
    mut stdin: std::process::ChildStdin,
    rx: mpsc::Receiver<(Vec<u8>, Duration)>,
    mut timecodes: BufWriter<File>,
    output: PathBuf,
) -> LoggerResult<PathBuf> {
    let mut frames: u64 = 0;
    writeln!(timecodes, "# timecode format v2")?;

    for (data, pts) in rx {
        if let Err(e) = stdin.write_all(&data) {
            tracing::error!("FFmpeg stdin closed after {} frames: {}", frames, e);
            break;
        }
        writeln!(timecodes, "{:.3}", pts.as_secs_f64() * 1000.0)?;
        frames += 1;
    }

    // Close stdin to signal EOF
    drop(stdin);
    timecodes.flush()?;

    let result = process.wait_with_output()?;
    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(LoggerError::Encode(format!(
            "FFmpeg exited with status {}: {}",
            result.status,
            stderr.trim()
        )));
    }

    tracing::debug!("FFmpeg encoded {} frames to {:?}", frames, output);
    Ok(output)
}

impl VideoEncoder for FfmpegEncoder {
    fn try_submit(&mut self, data: Vec<u8>, pts: Duration) -> LoggerResult<Submission> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(LoggerError::Closed("FFmpeg encoder finalized".to_string()));
        };
        match tx.try_send((data, pts)) {
            Ok(()) => Ok(Submission::Queued),
            Err(TrySendError::Full(_)) => Ok(Submission::Busy),
            Err(TrySendError::Disconnected(_)) => {
                Err(LoggerError::Closed("FFmpeg feeder stopped".to_string()))
            }
        }
    }

    fn finalize(mut self: Box<Self>) -> LoggerResult<PathBuf> {
        // Dropping the sender ends the feeder loop
        self.tx.take();
        let feeder = self
            .feeder
            .take()
            .ok_or_else(|| LoggerError::Closed("FFmpeg encoder finalized".to_string()))?;
        feeder
            .join()
            .map_err(|_| LoggerError::Encode("FFmpeg feeder thread panicked".to_string()))?
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timecodes_path() {
        assert_eq!(
            timecodes_path(Path::new("/s/20241210_090503/data.mov")),
            PathBuf::from("/s/20241210_090503/data.timecodes.txt")
        );
    }

    #[test]
    fn test_encoder_args_mov() {
        let config = VideoConfig::default();
        let size = FrameSize::new(640, 480).unwrap();
        let args = encoder_args(&config, Path::new("data.mov"), size, PixelFormat::Bgra8);

        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt bgra -s 640x480 -r 30 -i -"));
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 18 -pix_fmt yuv420p"));
        assert!(!joined.contains("faststart"));
        assert_eq!(args.last().map(String::as_str), Some("data.mov"));
    }

    #[test]
    fn test_encoder_args_mp4_faststart() {
        let config = VideoConfig {
            container: Container::Mp4,
            ..VideoConfig::default()
        };
        let size = FrameSize::new(2, 2).unwrap();
        let args = encoder_args(&config, Path::new("data.mp4"), size, PixelFormat::Rgba8);
        assert!(args.join(" ").contains("-movflags +faststart data.mp4"));
    }

    #[test]
    fn test_missing_binary_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = VideoConfig {
            ffmpeg_path: dir.path().join("no-such-ffmpeg").to_string_lossy().to_string(),
            ..VideoConfig::default()
        };
        let err = FfmpegEncoder::spawn(
            &config,
            &dir.path().join("data.mov"),
            FrameSize::new(4, 4).unwrap(),
            PixelFormat::Bgra8,
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}

//! Sensor logger harness
//!
//! Records one session from synthetic sensors, exercising the whole pipeline
//! without hardware.

use anyhow::{Context, Result};
use clap::Parser;
use sensor_logger::capture::{SensorSource, SyntheticCamera, SyntheticGps, SyntheticImu};
use sensor_logger::video::FfmpegEncoderFactory;
use sensor_logger::{RecordingConfig, RecordingCoordinator, RecordingEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory the session folder is created in [default: Documents]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON recording configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How long to record
    #[arg(short, long, default_value_t = 5)]
    seconds: u64,

    /// Skip the color video track
    #[arg(long, default_value_t = false)]
    no_video: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    sensor_logger::init_tracing();
    let cli = Cli::parse();

    tracing::info!("Starting Sensor Logger v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => RecordingConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RecordingConfig::default(),
    };
    if cli.no_video {
        config.video.enabled = false;
    }

    let base = match cli.output {
        Some(dir) => dir,
        None => dirs::document_dir()
            .context("No documents directory; pass --output")?,
    };

    let (width, height) = config
        .frame_size
        .map(|s| (s.width, s.height))
        .unwrap_or((192, 144));
    let ratio = config.depth_to_color_ratio;

    let factory = Arc::new(FfmpegEncoderFactory::new(config.video.clone()));
    let recorder = RecordingCoordinator::spawn(config, factory)
        .context("Invalid recording configuration")?;
    let mut events = recorder.subscribe();

    let session = recorder
        .start(&base)
        .await
        .with_context(|| format!("Failed to start recording in {}", base.display()))?;
    println!("Recording to {}", session.dir.display());

    let duration = Duration::from_secs(cli.seconds);
    let sources: Vec<Box<dyn SensorSource>> = vec![
        Box::new(SyntheticImu::new(100)),
        Box::new(SyntheticGps::new(42.2936, -83.7166)),
        Box::new(SyntheticCamera::new(30, width, height, ratio)),
    ];

    let mut tasks = Vec::new();
    for mut source in sources {
        let recorder = recorder.clone();
        tasks.push(tokio::spawn(async move {
            tracing::info!("Running {} source", source.id());
            source.run(recorder, duration).await;
        }));
    }
    for task in tasks {
        task.await.context("Sensor source panicked")?;
    }

    let summary = recorder
        .stop()
        .await?
        .context("Recorder was not recording")?;

    if summary.video_frames_accepted > 0 {
        let finished = tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                match events.recv().await {
                    Ok(RecordingEvent::VideoFinished(path)) => return path,
                    Ok(_) => continue,
                    Err(_) => return None,
                }
            }
        })
        .await
        .unwrap_or(None);

        match finished {
            Some(path) => println!("Video written to {}", path.display()),
            None => println!("Video was not finalized"),
        }
    }

    recorder.shutdown().await?;

    let stats = recorder.ingest_stats();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!(
        "Samples enqueued: {}, dropped on full queue: {}",
        stats.enqueued, stats.dropped_full
    );

    Ok(())
}

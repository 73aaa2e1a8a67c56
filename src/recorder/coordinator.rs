//! Recording coordinator
//!
//! Owns the recording lifecycle. Producers push samples through cheap,
//! non-blocking entry points; a single control task owns the active session
//! and applies samples, start and stop in arrival order.

use super::session::Session;
use super::state::{
    RecordingConfig, RecordingState, RecordingSummary, SessionInfo, StreamSelection,
};
use crate::capture::sync::{StreamSynchronizer, SynchronizedFramePair};
use crate::capture::traits::{CaptureBundle, ImuKind, ImuReading, LocationFix};
use crate::utils::{ErrorReport, LoggerError, LoggerResult};
use crate::video::EncoderFactory;
use chrono::Local;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started
    Started(SessionInfo),
    /// Recording stopped
    Stopped(RecordingSummary),
    /// Video track finalized (None if it failed)
    VideoFinished(Option<PathBuf>),
    /// Error occurred
    Error(ErrorReport),
}

enum ControlEvent {
    Start {
        base: PathBuf,
        reply: oneshot::Sender<LoggerResult<SessionInfo>>,
    },
    Stop {
        reply: oneshot::Sender<Option<RecordingSummary>>,
    },
    Imu(ImuReading),
    Locations(Vec<LocationFix>),
    FramePair(SynchronizedFramePair),
    Shutdown(oneshot::Sender<()>),
}

/// Ingestion counters shared by every handle
#[derive(Debug, Default)]
struct IngestCounters {
    enqueued: AtomicU64,
    dropped_full: AtomicU64,
}

/// Snapshot of ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Samples handed to the control task
    pub enqueued: u64,
    /// Samples dropped because the control queue was full
    pub dropped_full: u64,
}

/// Handle to a running recorder
///
/// Clones share the same recorder. Sample entry points never block and never
/// fail; while idle they do nothing.
#[derive(Clone)]
pub struct RecordingCoordinator {
    tx: mpsc::Sender<ControlEvent>,
    state: Arc<RwLock<RecordingState>>,
    event_tx: broadcast::Sender<RecordingEvent>,
    streams: StreamSelection,
    synchronizer: Arc<Mutex<StreamSynchronizer>>,
    counters: Arc<IngestCounters>,
}

impl RecordingCoordinator {
    /// Validate `config` and start the control task on the current runtime
    pub fn spawn(config: RecordingConfig, factory: Arc<dyn EncoderFactory>) -> LoggerResult<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.control_queue_capacity);
        let (event_tx, _) = broadcast::channel(100);
        let state = Arc::new(RwLock::new(RecordingState::Idle));

        let coordinator = Self {
            tx,
            state: Arc::clone(&state),
            event_tx: event_tx.clone(),
            streams: config.streams,
            synchronizer: Arc::new(Mutex::new(StreamSynchronizer::new(config.max_frame_skew_s))),
            counters: Arc::new(IngestCounters::default()),
        };

        let control = ControlLoop {
            config,
            factory,
            state,
            event_tx,
            synchronizer: Arc::clone(&coordinator.synchronizer),
            session: None,
        };
        tokio::spawn(control.run(rx));

        Ok(coordinator)
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    pub fn ingest_stats(&self) -> IngestStats {
        IngestStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped_full: self.counters.dropped_full.load(Ordering::Relaxed),
        }
    }

    /// Start recording into a new session directory under `base`.
    ///
    /// An active session is stopped first.
    pub async fn start(&self, base: impl AsRef<Path>) -> LoggerResult<SessionInfo> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::Start {
            base: base.as_ref().to_path_buf(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| control_gone())?
    }

    /// Stop recording. Returns `None` if nothing was recording.
    pub async fn stop(&self) -> LoggerResult<Option<RecordingSummary>> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::Stop { reply }).await?;
        rx.await.map_err(|_| control_gone())
    }

    /// Stop any active session and end the control task
    pub async fn shutdown(&self) -> LoggerResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlEvent::Shutdown(reply)).await?;
        rx.await.map_err(|_| control_gone())
    }

    async fn send(&self, event: ControlEvent) -> LoggerResult<()> {
        self.tx.send(event).await.map_err(|_| control_gone())
    }

    /// Non-blocking hand-off of one sample to the control task
    fn enqueue(&self, event: ControlEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.counters.dropped_full.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!("Recorder queue full, {} samples dropped so far", dropped);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Recorder stopped, dropping sample");
            }
        }
    }

    fn on_imu(&self, kind: ImuKind, timestamp: f64, values: [f64; 3]) {
        if !self.streams.imu || !self.is_recording() {
            return;
        }
        self.enqueue(ControlEvent::Imu(ImuReading {
            timestamp,
            kind,
            values,
        }));
    }

    /// Accelerometer reading in g
    pub fn on_accel(&self, timestamp: f64, values: [f64; 3]) {
        self.on_imu(ImuKind::Accelerometer, timestamp, values);
    }

    /// Gyroscope reading in rad/s
    pub fn on_gyro(&self, timestamp: f64, values: [f64; 3]) {
        self.on_imu(ImuKind::Gyroscope, timestamp, values);
    }

    pub fn on_location_batch(&self, fixes: Vec<LocationFix>) {
        if !self.streams.gps || !self.is_recording() || fixes.is_empty() {
            return;
        }
        self.enqueue(ControlEvent::Locations(fixes));
    }

    pub fn on_synchronized_frame_pair(&self, pair: SynchronizedFramePair) {
        if !self.streams.camera || !self.is_recording() {
            return;
        }
        self.enqueue(ControlEvent::FramePair(pair));
    }

    /// Pair a raw capture bundle and forward it if complete
    pub fn on_capture_bundle(&self, bundle: CaptureBundle) {
        if !self.streams.camera || !self.is_recording() {
            return;
        }
        let paired = self.synchronizer.lock().pair(bundle);
        if let Ok(pair) = paired {
            self.enqueue(ControlEvent::FramePair(pair));
        }
    }
}

fn control_gone() -> LoggerError {
    LoggerError::Closed("recorder control task".to_string())
}

/// State owned by the control task
struct ControlLoop {
    config: RecordingConfig,
    factory: Arc<dyn EncoderFactory>,
    state: Arc<RwLock<RecordingState>>,
    event_tx: broadcast::Sender<RecordingEvent>,
    synchronizer: Arc<Mutex<StreamSynchronizer>>,
    session: Option<Session>,
}

impl ControlLoop {
    async fn run(mut self, mut rx: mpsc::Receiver<ControlEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                ControlEvent::Start { base, reply } => {
                    let result = self.start(&base).await;
                    let _ = reply.send(result);
                }
                ControlEvent::Stop { reply } => {
                    let summary = self.stop().await;
                    let _ = reply.send(summary);
                }
                ControlEvent::Imu(reading) => {
                    if let Some(session) = &self.session {
                        session.log_imu(&reading);
                    }
                }
                ControlEvent::Locations(fixes) => {
                    if let Some(session) = &self.session {
                        for fix in &fixes {
                            session.log_location(fix);
                        }
                    }
                }
                ControlEvent::FramePair(pair) => self.frame_pair(pair),
                ControlEvent::Shutdown(reply) => {
                    self.stop().await;
                    let _ = reply.send(());
                    tracing::debug!("Recorder control task shut down");
                    return;
                }
            }
        }

        // Every handle was dropped
        self.stop().await;
    }

    async fn start(&mut self, base: &Path) -> LoggerResult<SessionInfo> {
        if self.session.is_some() {
            tracing::info!("Start requested while recording, restarting session");
            self.stop().await;
        }

        tracing::info!("Starting recording to: {:?}", base);
        match Session::create(base, Local::now(), &self.config) {
            Ok(session) => {
                let info = session.info().clone();
                self.synchronizer.lock().take_stats();
                self.session = Some(session);
                *self.state.write() = RecordingState::Recording;
                let _ = self.event_tx.send(RecordingEvent::Started(info.clone()));
                tracing::info!("Recording started");
                Ok(info)
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                let _ = self.event_tx.send(RecordingEvent::Error(ErrorReport::from(&e)));
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> Option<RecordingSummary> {
        let session = self.session.take()?;
        tracing::info!("Stopping recording");

        let (mut summary, completion) = session.close().await;
        summary.bundles_discarded = self.synchronizer.lock().take_stats().discarded();

        if let Some(completion) = completion {
            let event_tx = self.event_tx.clone();
            tokio::spawn(async move {
                let path = completion.await.ok().flatten();
                let _ = event_tx.send(RecordingEvent::VideoFinished(path));
            });
        }

        *self.state.write() = RecordingState::Idle;
        let _ = self.event_tx.send(RecordingEvent::Stopped(summary.clone()));

        tracing::info!("Recording stopped. {} records written", summary.records_written);
        Some(summary)
    }

    fn frame_pair(&mut self, pair: SynchronizedFramePair) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(e) = session.ensure_video(self.factory.as_ref(), &pair.color) {
            let _ = self.event_tx.send(RecordingEvent::Error(ErrorReport::from(&e)));
        }
        if let Some(e) = session.log_frame_pair(pair) {
            let _ = self.event_tx.send(RecordingEvent::Error(ErrorReport::from(&e)));
        }
    }
}

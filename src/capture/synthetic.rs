//! Synthetic sensor producers
//!
//! Stand-ins for the device layer. Each one pushes plausible samples into a
//! recorder at the real sensor's rate so the whole pipeline can be exercised
//! on a machine without a camera, IMU or GPS receiver.

use super::traits::{
    CaptureBundle, ColorFrame, ColorSample, DepthFrame, DepthPixelBuffer, DepthSample,
    Intrinsics, LocationFix, PixelFormat, SensorSource,
};
use crate::recorder::RecordingCoordinator;
use crate::utils::monotonic_seconds;
use async_trait::async_trait;
use half::f16;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Accelerometer and gyroscope at a fixed rate
pub struct SyntheticImu {
    rate_hz: u32,
}

impl SyntheticImu {
    pub fn new(rate_hz: u32) -> Self {
        Self {
            rate_hz: rate_hz.max(1),
        }
    }
}

#[async_trait]
impl SensorSource for SyntheticImu {
    fn id(&self) -> &str {
        "imu"
    }

    async fn run(&mut self, recorder: RecordingCoordinator, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.rate_hz as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut tick: u64 = 0;
        while Instant::now() < deadline {
            ticker.tick().await;
            let phase = tick as f64 / self.rate_hz as f64;
            let t = monotonic_seconds();

            // Device lying flat with a slow wobble
            recorder.on_accel(t, [0.01 * phase.sin(), 0.01 * phase.cos(), -1.0]);
            recorder.on_gyro(t, [0.02 * (2.0 * phase).sin(), 0.0, 0.005]);
            tick += 1;
        }

        tracing::debug!("Synthetic IMU produced {} ticks", tick);
    }
}

/// Location fixes delivered in one-second batches
pub struct SyntheticGps {
    latitude: f64,
    longitude: f64,
}

impl SyntheticGps {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[async_trait]
impl SensorSource for SyntheticGps {
    fn id(&self) -> &str {
        "gps"
    }

    async fn run(&mut self, recorder: RecordingCoordinator, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut ticker = interval(Duration::from_secs(1));

        let mut fixes = 0u64;
        while Instant::now() < deadline {
            ticker.tick().await;

            // Walking north at ~1.4 m/s
            self.latitude += 1.4 / 111_320.0;
            recorder.on_location_batch(vec![LocationFix {
                timestamp: monotonic_seconds(),
                latitude: self.latitude,
                longitude: self.longitude,
                heading_deg: 0.0,
                altitude_m: 12.0,
                horizontal_accuracy_m: 4.5,
                vertical_accuracy_m: 6.0,
                heading_accuracy_deg: 15.0,
                speed_mps: Some(1.4),
                speed_accuracy_mps: Some(0.3),
            }]);
            fixes += 1;
        }

        tracing::debug!("Synthetic GPS produced {} fixes", fixes);
    }
}

/// Paired color and depth bundles
///
/// Every `drop_every`th bundle has its depth side marked dropped, and the
/// top-left depth pixel is always NaN.
pub struct SyntheticCamera {
    fps: u32,
    width: u32,
    height: u32,
    depth_to_color_ratio: f64,
    drop_every: u64,
    intrinsics: Intrinsics,
}

impl SyntheticCamera {
    pub fn new(fps: u32, width: u32, height: u32, depth_to_color_ratio: f64) -> Self {
        Self {
            fps: fps.max(1),
            width,
            height,
            depth_to_color_ratio,
            drop_every: 45,
            intrinsics: Intrinsics {
                focal_length_x: width as f64 * 0.8,
                focal_length_y: width as f64 * 0.8,
                principal_point_x: width as f64 / 2.0,
                principal_point_y: height as f64 / 2.0,
            },
        }
    }

    fn depth_size(&self) -> (u32, u32) {
        let w = (self.width as f64 / self.depth_to_color_ratio).round().max(1.0) as u32;
        let h = (self.height as f64 / self.depth_to_color_ratio).round().max(1.0) as u32;
        (w, h)
    }

    fn bundle(&self, index: u64) -> CaptureBundle {
        let t = monotonic_seconds();

        let shade = (index % 256) as u8;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for _ in 0..(self.width * self.height) {
            data.extend_from_slice(&[shade, 128, 255 - shade, 255]);
        }

        let (dw, dh) = self.depth_size();
        let mut depth = Vec::with_capacity(dw as usize * dh as usize);
        for y in 0..dh {
            for x in 0..dw {
                // A tilted floor plane between 0.5 m and ~3 m
                let meters = 0.5 + 2.5 * (y as f32 / dh as f32) + 0.001 * x as f32;
                depth.push(f16::from_f32(meters));
            }
        }
        if let Some(first) = depth.first_mut() {
            *first = f16::NAN;
        }

        CaptureBundle {
            color: Some(ColorSample {
                frame: ColorFrame {
                    timestamp: t,
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::Bgra8,
                    data,
                    exposure_time_s: Some(1.0 / (2.0 * self.fps as f64)),
                    intrinsics: self.intrinsics,
                },
                dropped: false,
            }),
            depth: Some(DepthSample {
                frame: DepthFrame {
                    timestamp: t + 0.0005,
                    buffer: DepthPixelBuffer::from_f16(dw, dh, depth),
                },
                dropped: self.drop_every > 0 && index % self.drop_every == self.drop_every - 1,
            }),
        }
    }
}

#[async_trait]
impl SensorSource for SyntheticCamera {
    fn id(&self) -> &str {
        "camera"
    }

    async fn run(&mut self, recorder: RecordingCoordinator, duration: Duration) {
        let deadline = Instant::now() + duration;
        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.fps as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut index: u64 = 0;
        while Instant::now() < deadline {
            ticker.tick().await;
            recorder.on_capture_bundle(self.bundle(index));
            index += 1;
        }

        tracing::debug!("Synthetic camera produced {} bundles", index);
    }
}

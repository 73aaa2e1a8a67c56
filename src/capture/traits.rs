//! Capture sample definitions
//!
//! Platform-agnostic types handed to the recorder by camera, motion and
//! location producers, plus the trait those producers implement.

use crate::recorder::RecordingCoordinator;
use crate::utils::float::nan_if_null;
use async_trait::async_trait;
use half::f16;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pinhole calibration of a camera stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length along x, in pixels
    #[serde(deserialize_with = "nan_if_null")]
    pub focal_length_x: f64,

    /// Focal length along y, in pixels
    #[serde(deserialize_with = "nan_if_null")]
    pub focal_length_y: f64,

    /// Principal point x, in pixels
    #[serde(deserialize_with = "nan_if_null")]
    pub principal_point_x: f64,

    /// Principal point y, in pixels
    #[serde(deserialize_with = "nan_if_null")]
    pub principal_point_y: f64,
}

impl Intrinsics {
    /// Calibration of a stream whose resolution is `ratio` times smaller
    pub fn scaled_down(&self, ratio: f64) -> Self {
        Self {
            focal_length_x: self.focal_length_x / ratio,
            focal_length_y: self.focal_length_y / ratio,
            principal_point_x: self.principal_point_x / ratio,
            principal_point_y: self.principal_point_y / ratio,
        }
    }
}

/// Pixel layout of a color frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }

    /// FFmpeg `-pix_fmt` name for raw input
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Bgra8 => "bgra",
            PixelFormat::Rgba8 => "rgba",
            PixelFormat::Gray8 => "gray",
        }
    }
}

/// One color image from the camera
#[derive(Debug, Clone)]
pub struct ColorFrame {
    /// Capture time in monotonic seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Tightly packed rows, `width * height * bytes_per_pixel` bytes
    pub data: Vec<u8>,
    pub exposure_time_s: Option<f64>,
    pub intrinsics: Intrinsics,
}

impl ColorFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// Raw depth samples in meters
#[derive(Debug, Clone, PartialEq)]
pub enum DepthPixels {
    Float16(Vec<f16>),
    Float32(Vec<f32>),
}

impl DepthPixels {
    pub fn len(&self) -> usize {
        match self {
            DepthPixels::Float16(v) => v.len(),
            DepthPixels::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A width x height grid of depth-in-meters samples, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct DepthPixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: DepthPixels,
}

impl DepthPixelBuffer {
    pub fn from_f32(width: u32, height: u32, samples: Vec<f32>) -> Self {
        Self {
            width,
            height,
            pixels: DepthPixels::Float32(samples),
        }
    }

    pub fn from_f16(width: u32, height: u32, samples: Vec<f16>) -> Self {
        Self {
            width,
            height,
            pixels: DepthPixels::Float16(samples),
        }
    }
}

/// One depth map from the depth camera
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Capture time in monotonic seconds
    pub timestamp: f64,
    pub buffer: DepthPixelBuffer,
}

/// A color sample inside a bundle, as delivered by the acquisition layer
#[derive(Debug, Clone)]
pub struct ColorSample {
    pub frame: ColorFrame,
    pub dropped: bool,
}

/// A depth sample inside a bundle, as delivered by the acquisition layer
#[derive(Debug, Clone)]
pub struct DepthSample {
    pub frame: DepthFrame,
    pub dropped: bool,
}

/// Samples the platform grouped from one acquisition cycle
#[derive(Debug, Clone, Default)]
pub struct CaptureBundle {
    pub color: Option<ColorSample>,
    pub depth: Option<DepthSample>,
}

/// Which inertial sensor produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImuKind {
    Accelerometer,
    Gyroscope,
}

/// One accelerometer (g) or gyroscope (rad/s) reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuReading {
    pub timestamp: f64,
    pub kind: ImuKind,
    pub values: [f64; 3],
}

/// One location fix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub heading_deg: f64,
    pub altitude_m: f64,
    pub horizontal_accuracy_m: f64,
    pub vertical_accuracy_m: f64,
    pub heading_accuracy_deg: f64,
    pub speed_mps: Option<f64>,
    pub speed_accuracy_mps: Option<f64>,
}

/// A producer of sensor samples feeding a recorder
///
/// Implementations push into the coordinator's non-blocking entry points
/// and return once `duration` has elapsed.
#[async_trait]
pub trait SensorSource: Send {
    /// Short name used in logs
    fn id(&self) -> &str;

    /// Produce samples until `duration` has elapsed
    async fn run(&mut self, recorder: RecordingCoordinator, duration: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_down_intrinsics() {
        let color = Intrinsics {
            focal_length_x: 1200.0,
            focal_length_y: 1206.0,
            principal_point_x: 960.0,
            principal_point_y: 720.0,
        };
        let depth = color.scaled_down(6.0);
        assert_eq!(depth.focal_length_x, 200.0);
        assert_eq!(depth.focal_length_y, 201.0);
        assert_eq!(depth.principal_point_x, 160.0);
        assert_eq!(depth.principal_point_y, 120.0);
    }

    #[test]
    fn test_color_frame_expected_len() {
        let frame = ColorFrame {
            timestamp: 0.0,
            width: 4,
            height: 2,
            format: PixelFormat::Bgra8,
            data: vec![0; 32],
            exposure_time_s: None,
            intrinsics: Intrinsics {
                focal_length_x: 1.0,
                focal_length_y: 1.0,
                principal_point_x: 0.0,
                principal_point_y: 0.0,
            },
        };
        assert_eq!(frame.expected_len(), 32);
        assert_eq!(PixelFormat::Gray8.bytes_per_pixel(), 1);
    }
}

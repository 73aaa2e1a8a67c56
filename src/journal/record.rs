//! Journal record schema
//!
//! One record per line. Every line carries `time` (monotonic seconds) and
//! exactly one payload key: `sensor`, `gps` or `frames`. Frame sets also
//! carry `number`.

use crate::capture::traits::{ColorFrame, ImuKind, ImuReading, Intrinsics, LocationFix, PixelFormat};
use crate::depth::DEPTH_SCALE;
use crate::utils::float::{nan_if_null, nan_if_null_triple};
use crate::utils::LoggerResult;
use serde::{Deserialize, Serialize};

/// Camera index of the color stream in frame descriptors
pub const COLOR_CAMERA_INDEX: u32 = 0;

/// Camera index of the depth stream in frame descriptors
pub const DEPTH_CAMERA_INDEX: u32 = 1;

/// A single journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "nan_if_null")]
    pub time: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,

    #[serde(flatten)]
    pub payload: Payload,
}

/// Record payload; the variant name is the JSON key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Sensor(SensorPayload),
    Gps(GpsPayload),
    Frames(Vec<FrameDescriptor>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    #[serde(rename = "type")]
    pub kind: ImuKind,
    #[serde(deserialize_with = "nan_if_null_triple")]
    pub values: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsPayload {
    #[serde(deserialize_with = "nan_if_null")]
    pub latitude: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub longitude: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub heading_deg: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub altitude_m: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub horizontal_accuracy_m: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub vertical_accuracy_m: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub heading_accuracy_deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_accuracy_mps: Option<f64>,
}

/// Color layout recorded in a frame descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    Rgb,
    Gray,
}

impl From<PixelFormat> for ColorFormat {
    fn from(format: PixelFormat) -> Self {
        match format {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => ColorFormat::Rgb,
            PixelFormat::Gray8 => ColorFormat::Gray,
        }
    }
}

/// Per-camera metadata of one frame set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub camera_index: u32,
    #[serde(deserialize_with = "nan_if_null")]
    pub capture_time_s: f64,
    pub color_format: ColorFormat,

    /// Stored unit to meters, depth only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_scale: Option<f64>,

    /// Color only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time_s: Option<f64>,

    pub calibration: Intrinsics,
}

impl FrameDescriptor {
    pub fn color(frame: &ColorFrame) -> Self {
        Self {
            camera_index: COLOR_CAMERA_INDEX,
            capture_time_s: frame.timestamp,
            color_format: frame.format.into(),
            depth_scale: None,
            exposure_time_s: frame.exposure_time_s,
            calibration: frame.intrinsics,
        }
    }

    /// Depth descriptor whose calibration is derived from the color one
    pub fn depth(capture_time_s: f64, color_calibration: &Intrinsics, depth_to_color_ratio: f64) -> Self {
        Self {
            camera_index: DEPTH_CAMERA_INDEX,
            capture_time_s,
            color_format: ColorFormat::Gray,
            depth_scale: Some(DEPTH_SCALE),
            exposure_time_s: None,
            calibration: color_calibration.scaled_down(depth_to_color_ratio),
        }
    }
}

impl Record {
    pub fn imu(reading: &ImuReading) -> Self {
        Self {
            time: reading.timestamp,
            number: None,
            payload: Payload::Sensor(SensorPayload {
                kind: reading.kind,
                values: reading.values,
            }),
        }
    }

    pub fn gps(fix: &LocationFix) -> Self {
        Self {
            time: fix.timestamp,
            number: None,
            payload: Payload::Gps(GpsPayload {
                latitude: fix.latitude,
                longitude: fix.longitude,
                heading_deg: fix.heading_deg,
                altitude_m: fix.altitude_m,
                horizontal_accuracy_m: fix.horizontal_accuracy_m,
                vertical_accuracy_m: fix.vertical_accuracy_m,
                heading_accuracy_deg: fix.heading_accuracy_deg,
                speed_mps: fix.speed_mps,
                speed_accuracy_mps: fix.speed_accuracy_mps,
            }),
        }
    }

    pub fn frame_set(time: f64, number: u64, frames: Vec<FrameDescriptor>) -> Self {
        Self {
            time,
            number: Some(number),
            payload: Payload::Frames(frames),
        }
    }

    /// Serialize to one JSON line without terminator, keys sorted at every level
    pub fn to_line(&self) -> LoggerResult<String> {
        // Going through Value sorts keys: its map is ordered by key
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Intrinsics {
        Intrinsics {
            focal_length_x: 600.0,
            focal_length_y: 600.0,
            principal_point_x: 300.0,
            principal_point_y: 240.0,
        }
    }

    fn color_frame(timestamp: f64, exposure_time_s: Option<f64>, format: PixelFormat) -> ColorFrame {
        ColorFrame {
            timestamp,
            width: 2,
            height: 1,
            format,
            data: vec![0; 2 * format.bytes_per_pixel()],
            exposure_time_s,
            intrinsics: calibration(),
        }
    }

    #[test]
    fn test_imu_line_shape() {
        let record = Record::imu(&ImuReading {
            timestamp: 12.5,
            kind: ImuKind::Gyroscope,
            values: [0.1, -0.2, 0.3],
        });
        assert_eq!(
            record.to_line().unwrap(),
            r#"{"sensor":{"type":"gyroscope","values":[0.1,-0.2,0.3]},"time":12.5}"#
        );
    }

    #[test]
    fn test_gps_omits_missing_speed() {
        let record = Record::gps(&LocationFix {
            timestamp: 3.0,
            latitude: 42.0,
            longitude: -83.0,
            heading_deg: 90.0,
            altitude_m: 250.0,
            horizontal_accuracy_m: 5.0,
            vertical_accuracy_m: 8.0,
            heading_accuracy_deg: 10.0,
            speed_mps: None,
            speed_accuracy_mps: None,
        });
        let line = record.to_line().unwrap();
        assert!(line.starts_with(r#"{"gps":{"altitude_m":250.0,"heading_accuracy_deg":10.0"#));
        assert!(!line.contains("speed"));
        assert!(!line.contains("number"));
    }

    #[test]
    fn test_frame_set_descriptors() {
        let color = FrameDescriptor::color(&color_frame(1.0, Some(0.01), PixelFormat::Bgra8));
        let depth = FrameDescriptor::depth(1.001, &calibration(), 6.0);
        let record = Record::frame_set(1.0, 7, vec![color, depth]);

        let value: serde_json::Value = serde_json::from_str(&record.to_line().unwrap()).unwrap();
        assert_eq!(value["number"], 7);
        assert_eq!(value["frames"][0]["camera_index"], 0);
        assert_eq!(value["frames"][0]["color_format"], "rgb");
        assert_eq!(value["frames"][0]["exposure_time_s"], 0.01);
        assert!(value["frames"][0].get("depth_scale").is_none());
        assert_eq!(value["frames"][1]["camera_index"], 1);
        assert_eq!(value["frames"][1]["color_format"], "gray");
        assert_eq!(value["frames"][1]["depth_scale"], 0.001);
        assert_eq!(value["frames"][1]["calibration"]["focal_length_x"], 100.0);
        assert_eq!(value["frames"][1]["calibration"]["principal_point_y"], 40.0);
    }

    #[test]
    fn test_keys_sorted() {
        let record = Record::frame_set(
            2.0,
            0,
            vec![FrameDescriptor::color(&color_frame(2.0, None, PixelFormat::Rgba8))],
        );
        let line = record.to_line().unwrap();
        let frames = line.find("\"frames\"").unwrap();
        let number = line.find("\"number\"").unwrap();
        let time = line.find("\"time\"").unwrap();
        assert!(frames < number && number < time);

        let cal = line.find("\"calibration\"").unwrap();
        let cam = line.find("\"camera_index\"").unwrap();
        let cap = line.find("\"capture_time_s\"").unwrap();
        assert!(cal < cam && cam < cap);
    }

    #[test]
    fn test_parse_back() {
        let record = Record::frame_set(
            5.25,
            3,
            vec![
                FrameDescriptor::color(&color_frame(5.25, Some(0.004), PixelFormat::Bgra8)),
                FrameDescriptor::depth(5.2501, &calibration(), 6.0),
            ],
        );
        let parsed: Record = serde_json::from_str(&record.to_line().unwrap()).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_gray_color_frame_is_gray() {
        let descriptor = FrameDescriptor::color(&color_frame(1.0, None, PixelFormat::Gray8));
        assert_eq!(descriptor.color_format, ColorFormat::Gray);
        assert_eq!(descriptor.camera_index, COLOR_CAMERA_INDEX);
    }

    #[test]
    fn test_non_finite_values_survive_a_round_trip() {
        let record = Record::gps(&LocationFix {
            timestamp: 4.0,
            latitude: 42.0,
            longitude: -83.0,
            heading_deg: f64::NAN,
            altitude_m: 250.0,
            horizontal_accuracy_m: 5.0,
            vertical_accuracy_m: 8.0,
            heading_accuracy_deg: f64::INFINITY,
            speed_mps: Some(f64::NAN),
            speed_accuracy_mps: None,
        });
        let line = record.to_line().unwrap();
        assert!(line.contains(r#""heading_deg":null"#));

        let parsed: Record = serde_json::from_str(&line).unwrap();
        let Payload::Gps(gps) = parsed.payload else {
            panic!("expected gps payload");
        };
        assert!(gps.heading_deg.is_nan());
        assert!(gps.heading_accuracy_deg.is_nan());
        assert_eq!(gps.latitude, 42.0);
        assert_eq!(gps.speed_mps, None);
    }
}

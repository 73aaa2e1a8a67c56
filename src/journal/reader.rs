//! Journal replay

use super::record::Record;
use crate::utils::{LoggerError, LoggerResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse a journal back into records, in file order.
///
/// A trailing line without terminator (the process died mid-write) is
/// skipped with a warning; any other malformed line is an error.
pub fn read_journal(path: &Path) -> LoggerResult<Vec<Record>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut line = String::new();
    let mut line_number = 0usize;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_number += 1;

        let terminated = line.ends_with('\n');
        let text = line.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            continue;
        }

        match serde_json::from_str::<Record>(text) {
            Ok(record) => records.push(record),
            Err(e) if !terminated => {
                tracing::warn!(
                    "Ignoring truncated final line {} of {:?}: {}",
                    line_number,
                    path,
                    e
                );
            }
            Err(e) => {
                return Err(LoggerError::Encode(format!(
                    "{}:{}: {}",
                    path.display(),
                    line_number,
                    e
                )))
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::record::Payload;

    #[test]
    fn test_reads_crlf_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"sensor":{"type":"accelerometer","values":[0.0,0.0,-1.0]},"time":1.0}"#,
                "\r\n",
                r#"{"gps":{"altitude_m":1.0,"heading_accuracy_deg":1.0,"heading_deg":0.0,"horizontal_accuracy_m":3.0,"latitude":1.0,"longitude":2.0,"vertical_accuracy_m":4.0},"time":2.0}"#,
                "\r\n",
            ),
        )
        .unwrap();

        let records = read_journal(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0].payload, Payload::Sensor(_)));
        assert!(matches!(records[1].payload, Payload::Gps(_)));
        assert_eq!(records[1].time, 2.0);
    }

    #[test]
    fn test_skips_truncated_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"sensor":{"type":"gyroscope","values":[1.0,2.0,3.0]},"time":1.0}"#,
                "\r\n",
                r#"{"sensor":{"type":"gyro"#,
            ),
        )
        .unwrap();

        let records = read_journal(&path).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_malformed_middle_line_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(&path, "not json\r\n{\"time\":1.0}\r\n").unwrap();

        assert!(read_journal(&path).is_err());
    }

    #[test]
    fn test_nan_field_does_not_break_replay() {
        use crate::capture::traits::{ImuKind, ImuReading, LocationFix};

        let accel = |t: f64| {
            Record::imu(&ImuReading {
                timestamp: t,
                kind: ImuKind::Accelerometer,
                values: [0.0, f64::NAN, -1.0],
            })
        };
        let fix = Record::gps(&LocationFix {
            timestamp: 1.5,
            latitude: 42.29,
            longitude: -83.71,
            heading_deg: f64::NAN,
            altitude_m: 260.0,
            horizontal_accuracy_m: 3.0,
            vertical_accuracy_m: 5.0,
            heading_accuracy_deg: 12.0,
            speed_mps: None,
            speed_accuracy_mps: None,
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let mut content = String::new();
        for record in [accel(1.0), fix, accel(2.0)] {
            content.push_str(&record.to_line().unwrap());
            content.push_str("\r\n");
        }
        std::fs::write(&path, content).unwrap();

        let records = read_journal(&path).unwrap();
        assert_eq!(records.len(), 3);
        let Payload::Gps(ref gps) = records[1].payload else {
            panic!("expected gps payload");
        };
        assert!(gps.heading_deg.is_nan());
        assert_eq!(gps.altitude_m, 260.0);
        let Payload::Sensor(ref sensor) = records[2].payload else {
            panic!("expected sensor payload");
        };
        assert!(sensor.values[1].is_nan());
        assert_eq!(records[2].time, 2.0);
    }
}

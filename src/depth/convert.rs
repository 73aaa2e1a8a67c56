//! Depth plane to 16-bit millimetres

use crate::capture::traits::{DepthPixelBuffer, DepthPixels};

/// Stored value for a sample that could not be measured or represented
pub const INVALID_DEPTH: u16 = 0xFFFF;

/// Meters to stored units
pub const MILLIMETERS_PER_METER: f64 = 1000.0;

/// Stored units to meters, as written in frame descriptors
pub const DEPTH_SCALE: f64 = 1.0 / MILLIMETERS_PER_METER;

/// Converted depth plane in millimetres, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthGrid {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
    /// Finite samples that fell outside 0..=0xFFFE mm and were stored as
    /// [`INVALID_DEPTH`]
    pub out_of_range: usize,
}

/// Convert one depth sample in meters to millimetres.
///
/// Returns `Err(())` for finite values that do not fit below the sentinel.
#[inline]
fn to_millimeters(meters: f64) -> Result<u16, ()> {
    if !meters.is_finite() {
        return Ok(INVALID_DEPTH);
    }
    let mm = (meters * MILLIMETERS_PER_METER).round();
    if (0.0..=(INVALID_DEPTH - 1) as f64).contains(&mm) {
        Ok(mm as u16)
    } else {
        Err(())
    }
}

/// Convert a depth buffer into millimetres.
///
/// The buffer is consumed. Out-of-range samples never wrap; they become the
/// sentinel and are counted in [`DepthGrid::out_of_range`].
pub fn convert(buffer: DepthPixelBuffer) -> DepthGrid {
    let DepthPixelBuffer {
        width,
        height,
        pixels,
    } = buffer;

    let mut out_of_range = 0usize;
    let mut push = |meters: f64, samples: &mut Vec<u16>| match to_millimeters(meters) {
        Ok(mm) => samples.push(mm),
        Err(()) => {
            out_of_range += 1;
            samples.push(INVALID_DEPTH);
        }
    };

    let mut samples = Vec::with_capacity(pixels.len());
    match pixels {
        DepthPixels::Float16(values) => {
            for v in values {
                push(v.to_f64(), &mut samples);
            }
        }
        DepthPixels::Float32(values) => {
            for v in values {
                push(v as f64, &mut samples);
            }
        }
    }

    DepthGrid {
        width,
        height,
        samples,
        out_of_range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;
    use proptest::prelude::*;

    #[test]
    fn test_nan_becomes_sentinel() {
        let grid = convert(DepthPixelBuffer::from_f32(3, 1, vec![f32::NAN, 1.0, 2.5]));
        assert_eq!(grid.samples, vec![INVALID_DEPTH, 1000, 2500]);
        assert_eq!(grid.out_of_range, 0);
    }

    #[test]
    fn test_half_float_input() {
        let grid = convert(DepthPixelBuffer::from_f16(
            2,
            2,
            vec![
                f16::from_f32(0.5),
                f16::from_f32(2.0),
                f16::INFINITY,
                f16::from_f32(0.25),
            ],
        ));
        assert_eq!(grid.samples, vec![500, 2000, INVALID_DEPTH, 250]);
        assert_eq!((grid.width, grid.height), (2, 2));
    }

    #[test]
    fn test_rounds_half_away_from_zero() {
        let grid = convert(DepthPixelBuffer::from_f32(2, 1, vec![0.0015, 0.0004]));
        assert_eq!(grid.samples, vec![2, 0]);
    }

    #[test]
    fn test_out_of_range_is_flagged_not_wrapped() {
        let grid = convert(DepthPixelBuffer::from_f32(
            4,
            1,
            vec![-0.5, 65.534, 65.535, 70.0],
        ));
        assert_eq!(grid.samples, vec![INVALID_DEPTH, 65534, INVALID_DEPTH, INVALID_DEPTH]);
        assert_eq!(grid.out_of_range, 3);
    }

    proptest! {
        #[test]
        fn prop_length_preserved(values in prop::collection::vec(any::<f32>(), 0..256)) {
            let n = values.len();
            let grid = convert(DepthPixelBuffer::from_f32(n as u32, 1, values));
            prop_assert_eq!(grid.samples.len(), n);
        }

        #[test]
        fn prop_in_range_within_one_millimeter(meters in 0.0f32..65.0) {
            let grid = convert(DepthPixelBuffer::from_f32(1, 1, vec![meters]));
            let stored = grid.samples[0];
            prop_assert!(stored != INVALID_DEPTH);
            prop_assert!((stored as f64 - meters as f64 * 1000.0).abs() <= 1.0);
        }

        #[test]
        fn prop_non_finite_is_sentinel(bits in any::<u32>()) {
            let v = f32::from_bits(bits);
            let grid = convert(DepthPixelBuffer::from_f32(1, 1, vec![v]));
            if !v.is_finite() {
                prop_assert_eq!(grid.samples[0], INVALID_DEPTH);
                prop_assert_eq!(grid.out_of_range, 0);
            }
        }
    }
}

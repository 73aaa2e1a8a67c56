//! Lossless 16-bit PNG encoding of depth planes
//!
//! Only IHDR, IDAT and IEND are written: no gamma, sRGB or ICC chunks, so a
//! reader gets back exactly the stored sample values.

use super::convert::DepthGrid;
use crate::utils::{LoggerError, LoggerResult};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// A decoded 16-bit plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPlane {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub samples: Vec<u16>,
}

impl From<png::EncodingError> for LoggerError {
    fn from(error: png::EncodingError) -> Self {
        match error {
            png::EncodingError::IoError(e) => LoggerError::Io(e),
            other => LoggerError::Encode(other.to_string()),
        }
    }
}

impl From<png::DecodingError> for LoggerError {
    fn from(error: png::DecodingError) -> Self {
        match error {
            png::DecodingError::IoError(e) => LoggerError::Io(e),
            other => LoggerError::Encode(other.to_string()),
        }
    }
}

/// Write a converted depth grid as a single-channel 16-bit PNG
pub fn encode(grid: &DepthGrid, path: &Path) -> LoggerResult<()> {
    encode_plane(&grid.samples, grid.width, grid.height, 1, path)
}

/// Write a 1- or 2-channel 16-bit plane.
///
/// Fails with `Encode` before touching the filesystem when the dimensions or
/// the sample count are wrong.
pub fn encode_plane(
    samples: &[u16],
    width: u32,
    height: u32,
    channels: u8,
    path: &Path,
) -> LoggerResult<()> {
    if width == 0 || height == 0 {
        return Err(LoggerError::Encode(format!(
            "Invalid plane dimensions {}x{}",
            width, height
        )));
    }

    let color = match channels {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        n => {
            return Err(LoggerError::Encode(format!(
                "Unsupported channel count {}",
                n
            )))
        }
    };

    let expected = width as usize * height as usize * channels as usize;
    if samples.len() != expected {
        return Err(LoggerError::Encode(format!(
            "Plane has {} samples, expected {} for {}x{}x{}",
            samples.len(),
            expected,
            width,
            height,
            channels
        )));
    }

    // PNG stores 16-bit samples big-endian
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_be_bytes());
    }

    let file = File::create(path)?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Sixteen);
    encoder.set_compression(png::Compression::Fast);

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&bytes)?;
    writer.finish()?;

    Ok(())
}

/// Read a 16-bit greyscale (or greyscale+alpha) PNG back into samples
pub fn decode(path: &Path) -> LoggerResult<DecodedPlane> {
    let file = File::open(path)?;
    let mut decoder = png::Decoder::new(file);
    decoder.set_transformations(png::Transformations::IDENTITY);

    let mut reader = decoder.read_info()?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;

    if info.bit_depth != png::BitDepth::Sixteen {
        return Err(LoggerError::Encode(format!(
            "Expected 16-bit samples, found {:?}",
            info.bit_depth
        )));
    }
    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        other => {
            return Err(LoggerError::Encode(format!(
                "Unsupported color type {:?}",
                other
            )))
        }
    };

    let samples = buf[..info.buffer_size()]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(DecodedPlane {
        width: info.width,
        height: info.height,
        channels,
        samples,
    })
}

//! Depth frame serialization
//!
//! Floating-point meters are converted to 16-bit millimetres and written as
//! lossless PNG images.

pub mod convert;
pub mod encode;

pub use convert::{convert, DepthGrid, DEPTH_SCALE, INVALID_DEPTH};
pub use encode::{decode, encode, encode_plane, DecodedPlane};

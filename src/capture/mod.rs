//! Sensor capture inputs
//!
//! Sample types delivered by the device layer, the color/depth pair filter,
//! and synthetic producers for running the pipeline without hardware.

pub mod sync;
pub mod synthetic;
pub mod traits;

pub use sync::{BundleRejection, StreamSynchronizer, SyncStats, SynchronizedFramePair};
pub use synthetic::{SyntheticCamera, SyntheticGps, SyntheticImu};
pub use traits::{
    CaptureBundle, ColorFrame, ColorSample, DepthFrame, DepthPixelBuffer, DepthPixels,
    DepthSample, ImuKind, ImuReading, Intrinsics, LocationFix, PixelFormat, SensorSource,
};

//! Color/depth pairing
//!
//! The acquisition layer already groups samples captured in the same cycle.
//! This stage only filters: bundles with a missing or dropped side, or with
//! an implausible skew, never reach the recorder.

use super::traits::{CaptureBundle, ColorFrame, DepthFrame};

/// A color sample and a depth sample from the same acquisition cycle
#[derive(Debug, Clone)]
pub struct SynchronizedFramePair {
    pub color: ColorFrame,
    pub depth: DepthFrame,
}

impl SynchronizedFramePair {
    /// Depth minus color capture time, in seconds
    pub fn skew(&self) -> f64 {
        self.depth.timestamp - self.color.timestamp
    }
}

/// Why a bundle was not forwarded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BundleRejection {
    MissingColor,
    MissingDepth,
    Dropped { color: bool, depth: bool },
    Skew(f64),
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub bundles: u64,
    pub paired: u64,
    pub incomplete: u64,
    pub dropped: u64,
    pub out_of_window: u64,
}

impl SyncStats {
    /// Bundles that did not become a pair
    pub fn discarded(&self) -> u64 {
        self.incomplete + self.dropped + self.out_of_window
    }
}

/// Turns capture bundles into frame pairs
#[derive(Debug)]
pub struct StreamSynchronizer {
    max_skew_s: f64,
    stats: SyncStats,
}

impl StreamSynchronizer {
    /// `max_skew_s` is one frame interval of the slower stream.
    ///
    /// Bundles come from the acquisition layer already correlated; the window
    /// is only a guard against a producer handing over frames from different
    /// cycles.
    pub fn new(max_skew_s: f64) -> Self {
        Self {
            max_skew_s,
            stats: SyncStats::default(),
        }
    }

    /// Counters since the last call
    pub fn take_stats(&mut self) -> SyncStats {
        std::mem::take(&mut self.stats)
    }

    /// Classify one bundle. Each bundle stands alone; nothing is buffered.
    pub fn pair(&mut self, bundle: CaptureBundle) -> Result<SynchronizedFramePair, BundleRejection> {
        self.stats.bundles += 1;

        let Some(color) = bundle.color else {
            self.stats.incomplete += 1;
            tracing::debug!("Could not extract color frame from synchronized bundle");
            return Err(BundleRejection::MissingColor);
        };
        let Some(depth) = bundle.depth else {
            self.stats.incomplete += 1;
            tracing::debug!("Could not extract depth frame from synchronized bundle");
            return Err(BundleRejection::MissingDepth);
        };

        if color.dropped || depth.dropped {
            self.stats.dropped += 1;
            tracing::warn!(
                "Incomplete synchronized bundle: color dropped={}, depth dropped={}",
                color.dropped,
                depth.dropped
            );
            return Err(BundleRejection::Dropped {
                color: color.dropped,
                depth: depth.dropped,
            });
        }

        let pair = SynchronizedFramePair {
            color: color.frame,
            depth: depth.frame,
        };

        let skew = pair.skew();
        if !skew.is_finite() || skew.abs() >= self.max_skew_s {
            self.stats.out_of_window += 1;
            tracing::warn!(
                "Bundle skew {:.4}s outside {:.4}s window, discarding",
                skew,
                self.max_skew_s
            );
            return Err(BundleRejection::Skew(skew));
        }

        self.stats.paired += 1;
        tracing::debug!("Received synchronized frames, depth - color dt: {:.6}s", skew);
        Ok(pair)
    }
}

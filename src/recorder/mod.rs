//! Recording system module
//!
//! - RecordingCoordinator: lifecycle and non-blocking sample ingestion
//! - Session: one recording directory and its writers
//! - DepthFrameWriter: background depth image encoding

pub mod coordinator;
pub mod frames;
pub mod session;
pub mod state;

pub use coordinator::{IngestStats, RecordingCoordinator, RecordingEvent};
pub use frames::{depth_image_name, DepthFrameWriter, DepthWriterStats};
pub use session::{Session, DEPTH_DIR, JOURNAL_FILE};
pub use state::{RecordingConfig, RecordingState, RecordingSummary, SessionInfo, StreamSelection};

//! Shared utilities

pub mod clock;
pub mod error;
pub mod float;

pub use clock::{monotonic_seconds, session_dir_name};
pub use error::{ErrorReport, LoggerError, LoggerResult};

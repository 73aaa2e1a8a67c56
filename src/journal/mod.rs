//! Session journal
//!
//! The line-delimited JSON log of everything recorded in a session.

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::read_journal;
pub use record::{ColorFormat, FrameDescriptor, GpsPayload, Payload, Record, SensorPayload};
pub use writer::{JournalStats, JournalWriter};

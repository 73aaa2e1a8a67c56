//! Append-only journal writer
//!
//! Producers on any thread enqueue records; one dedicated thread owns the
//! file and writes them in arrival order. A line and its terminator are
//! written in a single call, so lines never interleave.

use super::record::Record;
use crate::utils::{LoggerError, LoggerResult};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tokio::sync::oneshot;

/// Line terminator
const LINE_END: &str = "\r\n";

/// Counters reported when the journal closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalStats {
    pub records_written: u64,
    pub write_failures: u64,
}

enum JournalCommand {
    Append(Record),
    Close(oneshot::Sender<JournalStats>),
}

/// Handle to a journal file and its writer thread
pub struct JournalWriter {
    path: PathBuf,
    tx: mpsc::Sender<JournalCommand>,
    closed: AtomicBool,
}

impl JournalWriter {
    /// Create (or truncate) the journal and start its writer thread
    pub fn open(path: &Path) -> LoggerResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let (tx, rx) = mpsc::channel();
        let thread_path = path.to_path_buf();
        std::thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || run_writer(file, rx, thread_path))?;

        tracing::info!("Opened journal {:?}", path);

        Ok(Self {
            path: path.to_path_buf(),
            tx,
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueue one record. Never blocks on I/O.
    pub fn append(&self, record: Record) -> LoggerResult<()> {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!("Dropping record for closed journal {:?}", self.path);
            return Err(LoggerError::Closed(self.path.display().to_string()));
        }
        self.tx
            .send(JournalCommand::Append(record))
            .map_err(|_| LoggerError::Closed(self.path.display().to_string()))
    }

    /// Drain pending records, sync the file to disk and stop the writer.
    ///
    /// Later appends fail with `Closed`. Closing twice is an error.
    pub async fn close(&self) -> LoggerResult<JournalStats> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(LoggerError::Closed(self.path.display().to_string()));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(JournalCommand::Close(reply_tx))
            .map_err(|_| LoggerError::Closed(self.path.display().to_string()))?;
        let stats = reply_rx
            .await
            .map_err(|_| LoggerError::Closed(self.path.display().to_string()))?;

        tracing::info!(
            "Closed journal {:?}: {} records, {} failed writes",
            self.path,
            stats.records_written,
            stats.write_failures
        );
        Ok(stats)
    }
}

fn write_record(out: &mut BufWriter<File>, record: &Record, stats: &mut JournalStats) {
    let result = record.to_line().and_then(|mut line| {
        line.push_str(LINE_END);
        out.write_all(line.as_bytes()).map_err(LoggerError::from)
    });

    match result {
        Ok(()) => stats.records_written += 1,
        Err(e) => {
            stats.write_failures += 1;
            tracing::warn!("Skipping journal record at t={}: {}", record.time, e);
        }
    }
}

fn run_writer(file: File, rx: mpsc::Receiver<JournalCommand>, path: PathBuf) {
    let mut out = BufWriter::new(file);
    let mut stats = JournalStats::default();

    while let Ok(command) = rx.recv() {
        match command {
            JournalCommand::Append(record) => write_record(&mut out, &record, &mut stats),
            JournalCommand::Close(reply) => {
                // Appends that raced the close still land in the file
                for late in rx.try_iter() {
                    if let JournalCommand::Append(record) = late {
                        write_record(&mut out, &record, &mut stats);
                    }
                }

                if let Err(e) = out.flush() {
                    tracing::error!("Failed to flush journal {:?}: {}", path, e);
                } else if let Err(e) = out.get_ref().sync_all() {
                    tracing::error!("Failed to sync journal {:?}: {}", path, e);
                }
                let _ = reply.send(stats);
                return;
            }
        }
    }

    // Every handle was dropped without close
    if let Err(e) = out.flush() {
        tracing::error!("Failed to flush abandoned journal {:?}: {}", path, e);
    }
    tracing::debug!("Journal writer for {:?} exiting", path);
}

//! Storage traits and error types
//!
//! This module defines the trait interface for record sinks and associated
//! error types.

use crate::extract::JobRecord;
use crate::storage::{NewRun, RunOutcome};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Record sink already closed")]
    SinkClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable destination for extracted records
///
/// A sink is opened once per run and is only ever driven by one caller at a
/// time; the persistence coordinator provides the mutual exclusion.
pub trait RecordSink: Send {
    /// Creates tables if they do not exist yet
    fn ensure_schema(&mut self) -> StorageResult<()>;

    /// Registers a new run and returns its ID
    fn begin_run(&mut self, run: &NewRun) -> StorageResult<i64>;

    /// Appends a batch of records atomically
    ///
    /// Either every record of the batch becomes durable or none does.
    ///
    /// # Returns
    ///
    /// The number of records written
    fn append(&mut self, run_id: i64, records: &[JobRecord]) -> StorageResult<usize>;

    /// Stores the final status and counters of a run
    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()>;

    /// Flushes and releases the underlying resource
    fn close(self: Box<Self>) -> StorageResult<()>;
}

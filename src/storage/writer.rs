//! Persistence coordinator
//!
//! Workers produce records concurrently but the sink is single-writer. All
//! appends go through one mutex, so each batch lands as a unit and batches
//! never interleave.

use crate::extract::JobRecord;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{NewRun, RunOutcome};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Result of one append call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
    /// Records made durable
    pub persisted: usize,
    /// Records dropped for missing required fields
    pub rejected: usize,
}

/// Serializes writes from concurrent workers into a single sink
pub struct PersistenceCoordinator {
    sink: Mutex<Option<Box<dyn RecordSink>>>,
    run_id: i64,
}

impl PersistenceCoordinator {
    /// Ensures the schema and registers the run
    ///
    /// # Arguments
    ///
    /// * `sink` - Destination opened for this run
    /// * `run` - Identity recorded on the run row
    pub fn open(mut sink: Box<dyn RecordSink>, run: &NewRun) -> StorageResult<Self> {
        sink.ensure_schema()?;
        let run_id = sink.begin_run(run)?;
        tracing::info!(run_id, seed = %run.seed_url, "Started run");

        Ok(Self {
            sink: Mutex::new(Some(sink)),
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Appends the complete records of a batch atomically
    ///
    /// Records missing a title or application link are dropped and counted.
    /// An empty batch is a no-op and does not touch the sink.
    pub fn append_records(&self, records: &[JobRecord]) -> StorageResult<AppendSummary> {
        let (complete, incomplete): (Vec<JobRecord>, Vec<JobRecord>) =
            records.iter().cloned().partition(JobRecord::is_complete);

        if !incomplete.is_empty() {
            tracing::warn!(
                rejected = incomplete.len(),
                "Dropping records without title or application link"
            );
        }

        if complete.is_empty() {
            return Ok(AppendSummary {
                persisted: 0,
                rejected: incomplete.len(),
            });
        }

        let mut guard = self.lock();
        let sink = guard.as_mut().ok_or(StorageError::SinkClosed)?;
        let persisted = sink.append(self.run_id, &complete)?;

        Ok(AppendSummary {
            persisted,
            rejected: incomplete.len(),
        })
    }

    /// Finalizes the run row and closes the sink
    ///
    /// Later appends fail with [`StorageError::SinkClosed`]. Closing twice is
    /// a no-op.
    pub fn close(&self, outcome: &RunOutcome) -> StorageResult<()> {
        let Some(mut sink) = self.lock().take() else {
            return Ok(());
        };

        let finished = sink.finish_run(self.run_id, outcome);
        let closed = sink.close();
        finished?;
        closed?;

        tracing::info!(
            run_id = self.run_id,
            status = outcome.status.to_db_string(),
            "Closed record sink"
        );
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn RecordSink>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

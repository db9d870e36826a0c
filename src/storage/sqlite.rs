//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordSink trait.

use crate::extract::JobRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{NewRun, RunOutcome, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, seed_url, config_hash, status, \
                           pages_fetched, records_persisted, errors";

/// SQLite record sink
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens or creates a database file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Counts stored jobs, optionally restricted to one run
    pub fn count_jobs(&self, run_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match run_id {
            Some(run_id) => self.conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }

    /// Loads the jobs of a run in insertion order
    pub fn load_jobs(&self, run_id: i64) -> StorageResult<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT title, location, salary, date_posted, due_date, email_address,
                    application_link, source_url
             FROM jobs WHERE run_id = ?1 ORDER BY id",
        )?;

        let jobs = stmt
            .query_map(params![run_id], |row| {
                Ok(JobRecord {
                    title: row.get(0)?,
                    location: row.get(1)?,
                    salary: row.get(2)?,
                    date_posted: row.get(3)?,
                    due_date: row.get(4)?,
                    email: row.get(5)?,
                    application_link: row.get(6)?,
                    source_url: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }
}

impl RecordSink for SqliteSink {
    fn ensure_schema(&mut self) -> StorageResult<()> {
        initialize_schema(&self.conn)?;
        Ok(())
    }

    fn begin_run(&mut self, run: &NewRun) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, seed_url, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                now,
                run.seed_url,
                run.config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn append(&mut self, run_id: i64, records: &[JobRecord]) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();

        // Dropping the transaction without commit rolls the batch back
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO jobs
                 (run_id, title, location, salary, date_posted, due_date, email_address,
                  application_link, source_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for record in records {
                stmt.execute(params![
                    run_id,
                    record.title,
                    record.location,
                    record.salary,
                    record.date_posted,
                    record.due_date,
                    record.email,
                    record.application_link,
                    record.source_url,
                    now,
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs
             SET status = ?1, finished_at = ?2, pages_fetched = ?3,
                 records_persisted = ?4, errors = ?5
             WHERE id = ?6",
            params![
                outcome.status.to_db_string(),
                now,
                outcome.pages_fetched as i64,
                outcome.records_persisted as i64,
                outcome.errors as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> StorageResult<()> {
        let sink = *self;
        sink.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        seed_url: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        pages_fetched: row.get::<_, i64>(6)? as u64,
        records_persisted: row.get::<_, i64>(7)? as u64,
        errors: row.get::<_, i64>(8)? as u64,
    })
}

//! Storage module for persisting crawl results
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Atomic batch appends of job records
//! - Run tracking with final counters
//! - Serializing writes from concurrent workers

mod schema;
mod sqlite;
mod traits;
mod writer;

pub use sqlite::SqliteSink;
pub use traits::{RecordSink, StorageError, StorageResult};
pub use writer::{AppendSummary, PersistenceCoordinator};

/// Identity of a run, recorded when it starts
#[derive(Debug, Clone)]
pub struct NewRun {
    pub seed_url: String,
    pub config_hash: String,
}

/// Final counters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub pages_fetched: u64,
    pub records_persisted: u64,
    pub errors: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub seed_url: String,
    pub config_hash: String,
    pub status: RunStatus,
    pub pages_fetched: u64,
    pub records_persisted: u64,
    pub errors: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

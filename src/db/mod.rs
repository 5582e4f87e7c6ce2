//! Database layer for scrape-pipeline
//!
//! Handles SQLite persistence for fetched records and source-key progress.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`records`]: Bulk record inserts and inspection
//! - [`source_keys`]: Per-key "processed" flags
//! - [`batch`]: Atomic commit of one persister batch

use sqlx::{FromRow, sqlite::SqlitePool};

use crate::types::{ProgressMarker, Record};
use crate::{Error, Result};

mod batch;
mod migrations;
mod records;
mod source_keys;

/// New record to be inserted into the database
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    /// Collection the record belongs to
    pub collection: String,
    /// The record's own key, if its collection defines a key field
    pub record_key: Option<String>,
    /// URL the record was fetched from
    pub source_url: String,
    /// JSON-encoded record object
    pub payload: String,
}

/// Record row from database
#[derive(Debug, Clone, FromRow)]
pub struct StoredRecord {
    /// Unique database ID
    pub id: i64,
    /// Collection the record belongs to
    pub collection: String,
    /// The record's own key
    pub record_key: Option<String>,
    /// URL the record was fetched from
    pub source_url: String,
    /// JSON-encoded record object
    pub payload: String,
    /// Unix timestamp when the record was committed
    pub created_at: i64,
}

impl StoredRecord {
    /// Decode the stored payload
    pub fn record(&self) -> Result<Record> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Everything one persister flush writes, committed as a unit
#[derive(Debug, Clone, Copy)]
pub struct CommitBatch<'a> {
    /// Collection the records go to
    pub collection: &'a str,
    /// Records to insert
    pub records: &'a [NewRecord],
    /// Flag that `processed_keys` are marked under (None for unkeyed resources)
    pub marker: Option<&'a ProgressMarker>,
    /// Source keys of the tasks that produced `records`
    pub processed_keys: &'a [String],
    /// Attributes to register as unprocessed for each inserted record key
    pub seeds: &'a [String],
}

impl CommitBatch<'_> {
    /// Whether committing would write nothing
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.processed_keys.is_empty()
    }
}

/// Row counts written by one committed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Records inserted
    pub records_inserted: u64,
    /// Source keys marked processed
    pub keys_marked: u64,
    /// New source keys registered from seeds
    pub keys_seeded: u64,
}

/// Database handle for scrape-pipeline
pub struct Database {
    pool: SqlitePool,
}

/// Store operations the pipeline depends on.
///
/// [`Database`] is the production implementation; tests substitute stores
/// that fail on purpose.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Keys still unprocessed under `marker`, in registration order
    async fn unprocessed_keys(&self, marker: &ProgressMarker) -> Result<Vec<String>>;

    /// Insert records and mark keys processed in one transaction
    async fn commit_batch(&self, batch: CommitBatch<'_>) -> Result<CommitOutcome>;
}

#[async_trait::async_trait]
impl RecordStore for Database {
    async fn unprocessed_keys(&self, marker: &ProgressMarker) -> Result<Vec<String>> {
        Database::unprocessed_keys(self, marker).await
    }

    async fn commit_batch(&self, batch: CommitBatch<'_>) -> Result<CommitOutcome> {
        Database::commit_batch(self, batch).await
    }
}

/// Map a query failure into the crate error with context
fn query_failed(context: &str, e: sqlx::Error) -> Error {
    Error::Database(crate::error::DatabaseError::QueryFailed(format!(
        "{}: {}",
        context, e
    )))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

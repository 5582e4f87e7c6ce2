//! Batched, transactional persistence of fetched tasks.
//!
//! [`BatchPersister`] collects the records and source keys of successful
//! tasks and commits them through a [`RecordStore`] once `flush_threshold`
//! tasks have accumulated. Records and "processed" marks of one batch land
//! in the same transaction, so a key is never marked without its records.

use serde_json::Value;
use std::sync::Arc;

use crate::config::SinkConfig;
use crate::db::{CommitBatch, NewRecord, RecordStore};
use crate::error::Result;
use crate::types::{ProgressMarker, Record, SOURCE_URL_FIELD, Task};

/// What a persister has written so far
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Records committed
    pub records_written: u64,
    /// Source keys marked processed
    pub keys_marked: u64,
    /// Flushes performed, including ones with nothing to write
    pub flushes: u64,
}

/// Accumulates successful tasks and flushes them in atomic batches.
///
/// Single writer: one strategy stage owns the persister for the whole run.
pub struct BatchPersister {
    store: Arc<dyn RecordStore>,
    sink: SinkConfig,
    marker: Option<ProgressMarker>,
    flush_threshold: usize,
    pending_records: Vec<NewRecord>,
    pending_keys: Vec<String>,
    tasks_since_flush: usize,
    stats: PersistStats,
}

impl BatchPersister {
    /// Create a persister writing into `sink.collection`.
    ///
    /// `marker` is the flag set for the source keys of appended tasks; pass
    /// `None` for resources without source keys.
    pub fn new(
        store: Arc<dyn RecordStore>,
        sink: SinkConfig,
        marker: Option<ProgressMarker>,
        flush_threshold: usize,
    ) -> Self {
        Self {
            store,
            sink,
            marker,
            flush_threshold: flush_threshold.max(1),
            pending_records: Vec::new(),
            pending_keys: Vec::new(),
            tasks_since_flush: 0,
            stats: PersistStats::default(),
        }
    }

    /// Add a successful task to the batch, flushing when the threshold is hit.
    ///
    /// Failed tasks must be routed elsewhere by the caller.
    pub async fn append(&mut self, mut task: Task) -> Result<()> {
        debug_assert!(
            !task.is_failed(),
            "failed task {} appended to persister",
            task.target()
        );

        for record in task.take_records() {
            let new_record = self.to_new_record(task.target(), record)?;
            self.pending_records.push(new_record);
        }
        if let Some(key) = task.source_key() {
            self.pending_keys.push(key.to_string());
        }
        self.tasks_since_flush += 1;

        if self.tasks_since_flush >= self.flush_threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Commit everything pending in one transaction.
    ///
    /// With nothing pending no transaction is opened, but the flush still
    /// counts. On failure the batch stays pending and the error is returned.
    pub async fn flush(&mut self) -> Result<()> {
        self.stats.flushes += 1;

        let batch = CommitBatch {
            collection: &self.sink.collection,
            records: &self.pending_records,
            marker: self.marker.as_ref(),
            processed_keys: &self.pending_keys,
            seeds: &self.sink.seeds,
        };

        if batch.is_empty() {
            tracing::debug!(collection = %self.sink.collection, "nothing to flush");
            self.tasks_since_flush = 0;
            return Ok(());
        }

        let outcome = self.store.commit_batch(batch).await.inspect_err(|e| {
            tracing::error!(
                collection = %self.sink.collection,
                records = self.pending_records.len(),
                keys = self.pending_keys.len(),
                error = %e,
                "batch commit failed"
            );
        })?;

        tracing::info!(
            collection = %self.sink.collection,
            records = outcome.records_inserted,
            keys_marked = outcome.keys_marked,
            keys_seeded = outcome.keys_seeded,
            "batch flushed"
        );

        self.stats.records_written += outcome.records_inserted;
        self.stats.keys_marked += outcome.keys_marked;
        self.pending_records.clear();
        self.pending_keys.clear();
        self.tasks_since_flush = 0;
        Ok(())
    }

    /// Counters for the run summary
    pub fn stats(&self) -> PersistStats {
        self.stats
    }

    /// Successful tasks appended since the last flush
    pub fn tasks_since_flush(&self) -> usize {
        self.tasks_since_flush
    }

    /// Records waiting for the next flush
    pub fn pending_records(&self) -> &[NewRecord] {
        &self.pending_records
    }

    /// Source keys waiting to be marked
    pub fn pending_keys(&self) -> &[String] {
        &self.pending_keys
    }

    fn to_new_record(&self, target: &str, record: Record) -> Result<NewRecord> {
        let record_key = self
            .sink
            .key_field
            .as_deref()
            .and_then(|field| record.get(field))
            .and_then(key_string);
        let source_url = record
            .get(SOURCE_URL_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(target)
            .to_string();
        let payload = serde_json::to_string(&record)?;

        Ok(NewRecord {
            collection: self.sink.collection.clone(),
            record_key,
            source_url,
            payload,
        })
    }
}

/// String form of a key value; ids arrive as numbers or strings
fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

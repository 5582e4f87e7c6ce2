//! Atomic commit of one persister batch.

use crate::error::DatabaseError;
use crate::types::ProgressMarker;
use crate::{Error, Result};

use super::records::insert_records_on;
use super::source_keys::{mark_processed_on, register_on};
use super::{CommitBatch, CommitOutcome, Database};

impl Database {
    /// Insert the batch's records, mark its source keys processed and
    /// register seed keys, all in one transaction.
    ///
    /// On any failure the transaction is rolled back and nothing from the
    /// batch is visible.
    pub async fn commit_batch(&self, batch: CommitBatch<'_>) -> Result<CommitOutcome> {
        let commit_failed = |stage: &str, e: sqlx::Error| {
            Error::Database(DatabaseError::CommitFailed {
                collection: batch.collection.to_string(),
                reason: format!("{}: {}", stage, e),
            })
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| commit_failed("begin", e))?;

        let records_inserted = insert_records_on(&mut tx, batch.records)
            .await
            .map_err(|e| commit_failed("insert records", e))?;

        let keys_marked = match batch.marker {
            Some(marker) => mark_processed_on(&mut tx, marker, batch.processed_keys)
                .await
                .map_err(|e| commit_failed("mark processed", e))?,
            None => 0,
        };

        let mut keys_seeded = 0;
        if !batch.seeds.is_empty() {
            let record_keys: Vec<String> = batch
                .records
                .iter()
                .filter_map(|r| r.record_key.clone())
                .collect();
            for attribute in batch.seeds {
                let marker = ProgressMarker::new(batch.collection, attribute.as_str());
                keys_seeded += register_on(&mut tx, &marker, &record_keys)
                    .await
                    .map_err(|e| commit_failed("register seeds", e))?;
            }
        }

        tx.commit().await.map_err(|e| commit_failed("commit", e))?;

        tracing::debug!(
            collection = batch.collection,
            records_inserted,
            keys_marked,
            keys_seeded,
            "batch committed"
        );

        Ok(CommitOutcome {
            records_inserted,
            keys_marked,
            keys_seeded,
        })
    }
}

//! Bulk record inserts and inspection.

use sqlx::SqliteConnection;

use crate::Result;

use super::{Database, NewRecord, StoredRecord, query_failed};

/// SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999 and each record uses
/// 5 bind variables.
const MAX_RECORDS_PER_INSERT: usize = 199;

impl Database {
    /// Insert records outside of a batch commit
    ///
    /// Runs in its own transaction; returns the number of rows inserted.
    pub async fn insert_records(&self, records: &[NewRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("Failed to begin transaction", e))?;
        let inserted = insert_records_on(&mut tx, records)
            .await
            .map_err(|e| query_failed("Failed to insert records", e))?;
        tx.commit()
            .await
            .map_err(|e| query_failed("Failed to commit records", e))?;

        Ok(inserted)
    }

    /// Number of stored records in a collection
    pub async fn count_records(&self, collection: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to count records", e))
    }

    /// All stored records in a collection, oldest first
    pub async fn list_records(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT id, collection, record_key, source_url, payload, created_at
            FROM records
            WHERE collection = ?
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to list records", e))
    }

    /// Stored records in a collection with the given record key
    pub async fn find_records_by_key(
        &self,
        collection: &str,
        record_key: &str,
    ) -> Result<Vec<StoredRecord>> {
        sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT id, collection, record_key, source_url, payload, created_at
            FROM records
            WHERE collection = ? AND record_key = ?
            ORDER BY id ASC
            "#,
        )
        .bind(collection)
        .bind(record_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to find records", e))
    }
}

/// Chunked multi-row insert on an open connection or transaction
pub(super) async fn insert_records_on(
    conn: &mut SqliteConnection,
    records: &[NewRecord],
) -> std::result::Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;

    for chunk in records.chunks(MAX_RECORDS_PER_INSERT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO records (collection, record_key, source_url, payload, created_at) ",
        );

        query_builder.push_values(chunk, |mut b, record| {
            b.push_bind(&record.collection)
                .push_bind(&record.record_key)
                .push_bind(&record.source_url)
                .push_bind(&record.payload)
                .push_bind(now);
        });

        let result = query_builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

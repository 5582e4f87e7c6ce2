//! Source-key progress flags.
//!
//! Each row is one `(collection, key, attribute)` flag. Keyed fetchers read
//! the keys whose flag is still unset; the persister sets flags once the
//! records fetched for a key are committed.

use sqlx::SqliteConnection;

use crate::Result;
use crate::types::ProgressMarker;

use super::{Database, query_failed};

/// 5 bind variables per row, under SQLite's 999 limit
const MAX_KEYS_PER_STATEMENT: usize = 199;

impl Database {
    /// Register keys as unprocessed under `marker`
    ///
    /// Keys that are already registered keep their current flag. Returns the
    /// number of newly registered keys.
    pub async fn register_source_keys(
        &self,
        marker: &ProgressMarker,
        keys: &[String],
    ) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_failed("Failed to acquire connection", e))?;
        register_on(&mut conn, marker, keys)
            .await
            .map_err(|e| query_failed("Failed to register source keys", e))
    }

    /// Set the processed flag for `keys` under `marker`
    pub async fn mark_processed(&self, marker: &ProgressMarker, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_failed("Failed to acquire connection", e))?;
        mark_processed_on(&mut conn, marker, keys)
            .await
            .map_err(|e| query_failed("Failed to mark source keys processed", e))
    }

    /// Keys whose flag is still unset, in registration order
    pub async fn unprocessed_keys(&self, marker: &ProgressMarker) -> Result<Vec<String>> {
        self.keys_with_flag(marker, false).await
    }

    /// Keys whose flag is set, in registration order
    pub async fn processed_keys(&self, marker: &ProgressMarker) -> Result<Vec<String>> {
        self.keys_with_flag(marker, true).await
    }

    async fn keys_with_flag(&self, marker: &ProgressMarker, processed: bool) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT key FROM source_keys
            WHERE collection = ? AND attribute = ? AND processed = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(&marker.collection)
        .bind(&marker.attribute)
        .bind(processed)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to query source keys", e))
    }
}

/// `INSERT OR IGNORE` the keys with `processed = 0`
pub(super) async fn register_on(
    conn: &mut SqliteConnection,
    marker: &ProgressMarker,
    keys: &[String],
) -> std::result::Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let mut registered = 0;

    for chunk in keys.chunks(MAX_KEYS_PER_STATEMENT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT OR IGNORE INTO source_keys (collection, key, attribute, processed, updated_at) ",
        );
        query_builder.push_values(chunk, |mut b, key| {
            b.push_bind(&marker.collection)
                .push_bind(key)
                .push_bind(&marker.attribute)
                .push_bind(false)
                .push_bind(now);
        });

        registered += query_builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(registered)
}

/// Upsert the keys with `processed = 1`
///
/// A key that was never registered is inserted already processed.
pub(super) async fn mark_processed_on(
    conn: &mut SqliteConnection,
    marker: &ProgressMarker,
    keys: &[String],
) -> std::result::Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().timestamp();
    let mut marked = 0;

    for chunk in keys.chunks(MAX_KEYS_PER_STATEMENT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO source_keys (collection, key, attribute, processed, updated_at) ",
        );
        query_builder.push_values(chunk, |mut b, key| {
            b.push_bind(&marker.collection)
                .push_bind(key)
                .push_bind(&marker.attribute)
                .push_bind(true)
                .push_bind(now);
        });
        query_builder.push(
            " ON CONFLICT(collection, key, attribute) DO UPDATE SET processed = 1, updated_at = excluded.updated_at",
        );

        marked += query_builder.build().execute(&mut *conn).await?.rows_affected();
    }

    Ok(marked)
}

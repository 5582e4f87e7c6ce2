//! Resource fetchers
//!
//! A fetcher knows two things about a resource: which tasks exist right now
//! ([`ResourceFetcher::enumerate_tasks`]) and how to complete one task
//! ([`ResourceFetcher::fetch`]). Fetch faults never escape `fetch`; they are
//! recorded on the task and logged.
//!
//! - [`KeyedFetcher`]: one task per source key still unprocessed in the store
//! - [`PaginatedFetcher`]: one task per page of a listing, found by a probe

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::config::{KeySource, ResourceConfig};
use crate::db::RecordStore;
use crate::error::Result;
use crate::types::Task;

pub mod client;
pub mod key_path;
mod keyed;
mod paginated;

pub use client::HttpClient;
pub use key_path::{KeyPath, Node};
pub use keyed::KeyedFetcher;
pub use paginated::PaginatedFetcher;

/// Source of fetch tasks for one resource
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Tasks that still need fetching, reflecting the current store state.
    ///
    /// The stream is finite and not restartable. A failure here (for
    /// example a failed pagination probe) aborts the run.
    async fn enumerate_tasks(&self) -> Result<BoxStream<'static, Task>>;

    /// Perform the task's request and return it completed.
    ///
    /// Never fails: network, status and decode faults mark the task failed.
    async fn fetch(&self, task: Task) -> Task;
}

/// Build the fetcher a resource's key source calls for
pub fn for_resource(
    resource: &ResourceConfig,
    client: HttpClient,
    store: Arc<dyn RecordStore>,
) -> Arc<dyn ResourceFetcher> {
    match &resource.source {
        KeySource::Paginated => Arc::new(PaginatedFetcher::new(
            client,
            resource.request_template.clone(),
            &resource.response_key_path,
        )),
        KeySource::Keyed { marker } => Arc::new(KeyedFetcher::new(
            client,
            store,
            resource.request_template.clone(),
            &resource.response_key_path,
            marker.clone(),
        )),
    }
}

/// GET the task's target and extract records along `key_path`
pub(crate) async fn fetch_into(client: &HttpClient, key_path: &KeyPath, mut task: Task) -> Task {
    let outcome = client.get_json(task.target()).await;
    match outcome.and_then(|body| key_path.extract_records(&body)) {
        Ok(records) => {
            tracing::debug!(
                url = task.target(),
                records = records.len(),
                "task fetched"
            );
            task.mark_fetched(records);
        }
        Err(fault) => task.mark_failed(&fault),
    }
    task
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

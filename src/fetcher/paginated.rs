use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::types::Task;

use super::{HttpClient, KeyPath, ResourceFetcher, fetch_into};

/// Fetches a listing page by page.
///
/// Before enumerating, a probe requests page 1 and reads
/// `pagination.pages`. The probe body is thrown away and page 1 is fetched
/// again as the first task.
pub struct PaginatedFetcher {
    client: HttpClient,
    base_url: String,
    key_path: KeyPath,
    total_pages: AtomicU64,
}

impl PaginatedFetcher {
    /// Create a fetcher for the listing at `base_url`
    pub fn new(client: HttpClient, base_url: String, response_key_path: &str) -> Self {
        Self {
            client,
            base_url,
            key_path: KeyPath::parse(response_key_path),
            total_pages: AtomicU64::new(1),
        }
    }

    /// Page count found by the last probe (1 until a probe says otherwise)
    pub fn total_pages(&self) -> u64 {
        self.total_pages.load(Ordering::Relaxed)
    }

    /// URL of one page
    pub fn page_url(&self, page: u64) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.base_url, separator, page)
    }

    /// Probe page 1. `Some(pages)` if the listing is paginated.
    async fn discover_pages(&self) -> Result<Option<u64>> {
        let probe_url = self.page_url(1);
        let body = self
            .client
            .get_json(&probe_url)
            .await
            .map_err(|e| Error::Discovery {
                url: probe_url.clone(),
                reason: e.to_string(),
            })?;

        let Some(pagination) = body.get("pagination") else {
            return Ok(None);
        };

        match pagination.get("pages").and_then(Value::as_u64) {
            Some(pages) => Ok(Some(pages)),
            None => Err(Error::Discovery {
                url: probe_url,
                reason: format!("pagination without an integer page count: {}", pagination),
            }),
        }
    }
}

#[async_trait]
impl ResourceFetcher for PaginatedFetcher {
    async fn enumerate_tasks(&self) -> Result<BoxStream<'static, Task>> {
        let tasks: Vec<Task> = match self.discover_pages().await? {
            Some(pages) => {
                self.total_pages.store(pages, Ordering::Relaxed);
                tracing::info!(url = %self.base_url, pages, "listing is paginated");
                (1..=pages).map(|page| Task::unkeyed(self.page_url(page))).collect()
            }
            None => {
                self.total_pages.store(1, Ordering::Relaxed);
                tracing::info!(url = %self.base_url, "listing is not paginated");
                vec![Task::unkeyed(self.base_url.clone())]
            }
        };
        Ok(stream::iter(tasks).boxed())
    }

    async fn fetch(&self, task: Task) -> Task {
        fetch_into(&self.client, &self.key_path, task).await
    }
}

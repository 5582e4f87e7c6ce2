use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::Arc;

use crate::config::KEY_PLACEHOLDER;
use crate::db::RecordStore;
use crate::error::Result;
use crate::types::{ProgressMarker, Task};

use super::{HttpClient, KeyPath, ResourceFetcher, fetch_into};

/// Fetches one URL per source key whose `marker` flag is still unset
pub struct KeyedFetcher {
    client: HttpClient,
    store: Arc<dyn RecordStore>,
    request_template: String,
    key_path: KeyPath,
    marker: ProgressMarker,
}

impl KeyedFetcher {
    /// Create a fetcher; `request_template` contains `{key}`
    pub fn new(
        client: HttpClient,
        store: Arc<dyn RecordStore>,
        request_template: String,
        response_key_path: &str,
        marker: ProgressMarker,
    ) -> Self {
        Self {
            client,
            store,
            request_template,
            key_path: KeyPath::parse(response_key_path),
            marker,
        }
    }

    /// Marker this fetcher selects keys by
    pub fn marker(&self) -> &ProgressMarker {
        &self.marker
    }

    /// Resolved URL for one key
    pub fn target_for(&self, key: &str) -> String {
        self.request_template.replace(KEY_PLACEHOLDER, key)
    }
}

#[async_trait]
impl ResourceFetcher for KeyedFetcher {
    async fn enumerate_tasks(&self) -> Result<BoxStream<'static, Task>> {
        let keys = self.store.unprocessed_keys(&self.marker).await?;
        tracing::info!(
            marker = %self.marker,
            pending = keys.len(),
            "enumerated unprocessed keys"
        );

        let tasks: Vec<Task> = keys
            .into_iter()
            .map(|key| Task::keyed(self.target_for(&key), key))
            .collect();
        Ok(stream::iter(tasks).boxed())
    }

    async fn fetch(&self, task: Task) -> Task {
        fetch_into(&self.client, &self.key_path, task).await
    }
}

//! In-memory doubles for the store and the fetcher.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::db::{CommitBatch, CommitOutcome, NewRecord, RecordStore};
use crate::error::{DatabaseError, Error, FetchError, Result};
use crate::fetcher::ResourceFetcher;
use crate::types::{ProgressMarker, Task};

#[derive(Default)]
struct StoreState {
    // (collection, attribute) -> ordered keys with their processed flag
    keys: HashMap<ProgressMarker, Vec<(String, bool)>>,
    records: Vec<NewRecord>,
    commits: usize,
}

/// Store double that keeps everything in memory and can refuse commits
#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<StoreState>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn with_keys(marker: &ProgressMarker, keys: &[&str]) -> Self {
        let store = Self::default();
        store.register(marker, keys);
        store
    }

    pub(crate) fn register(&self, marker: &ProgressMarker, keys: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let entry = state.keys.entry(marker.clone()).or_default();
        for key in keys {
            if !entry.iter().any(|(k, _)| k == key) {
                entry.push((key.to_string(), false));
            }
        }
    }

    pub(crate) fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub(crate) fn records(&self, collection: &str) -> Vec<NewRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.collection == collection)
            .cloned()
            .collect()
    }

    pub(crate) fn processed(&self, marker: &ProgressMarker) -> Vec<String> {
        self.keys_with_flag(marker, true)
    }

    pub(crate) fn unprocessed(&self, marker: &ProgressMarker) -> Vec<String> {
        self.keys_with_flag(marker, false)
    }

    fn keys_with_flag(&self, marker: &ProgressMarker, processed: bool) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .keys
            .get(marker)
            .map(|keys| {
                keys.iter()
                    .filter(|(_, p)| *p == processed)
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn unprocessed_keys(&self, marker: &ProgressMarker) -> Result<Vec<String>> {
        Ok(self.unprocessed(marker))
    }

    async fn commit_batch(&self, batch: CommitBatch<'_>) -> Result<CommitOutcome> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::CommitFailed {
                collection: batch.collection.to_string(),
                reason: "commits disabled".into(),
            }));
        }

        let mut state = self.state.lock().unwrap();
        state.commits += 1;
        state.records.extend(batch.records.iter().cloned());

        let mut outcome = CommitOutcome {
            records_inserted: batch.records.len() as u64,
            ..Default::default()
        };
        if let Some(marker) = batch.marker {
            let entry = state.keys.entry(marker.clone()).or_default();
            for key in batch.processed_keys {
                match entry.iter_mut().find(|(k, _)| k == key) {
                    Some((_, processed)) => *processed = true,
                    None => entry.push((key.clone(), true)),
                }
                outcome.keys_marked += 1;
            }
        }
        for attribute in batch.seeds {
            let marker = ProgressMarker::new(batch.collection, attribute.as_str());
            let entry = state.keys.entry(marker).or_default();
            for key in batch.records.iter().filter_map(|r| r.record_key.as_ref()) {
                if !entry.iter().any(|(k, _)| k == key) {
                    entry.push((key.clone(), false));
                    outcome.keys_seeded += 1;
                }
            }
        }
        Ok(outcome)
    }
}

/// What the stub answers for one key
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reply {
    /// Succeed with this many records
    Records(usize),
    /// Fail the task
    Fault,
    /// Panic inside `fetch`
    Panic,
}

/// Fetcher double over a [`MemoryStore`], with concurrency instrumentation
pub(crate) struct StubFetcher {
    store: Arc<MemoryStore>,
    marker: ProgressMarker,
    replies: HashMap<String, Reply>,
    default_reply: Reply,
    delay: Duration,
    key_delays: HashMap<String, Duration>,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    enumerated: Arc<AtomicU64>,
    started: AtomicU64,
    fetched_keys: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub(crate) fn new(store: Arc<MemoryStore>, marker: ProgressMarker, default_reply: Reply) -> Self {
        Self {
            store,
            marker,
            replies: HashMap::new(),
            default_reply,
            delay: Duration::ZERO,
            key_delays: HashMap::new(),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            enumerated: Arc::new(AtomicU64::new(0)),
            started: AtomicU64::new(0),
            fetched_keys: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(mut self, key: &str, reply: Reply) -> Self {
        self.replies.insert(key.to_string(), reply);
        self
    }

    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fetching `key` takes `delay` instead of the default
    pub(crate) fn slow(mut self, key: &str, delay: Duration) -> Self {
        self.key_delays.insert(key.to_string(), delay);
        self
    }

    /// Every fetch waits for a permit from `gate` before completing
    pub(crate) fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Tasks pulled from the enumeration stream so far
    pub(crate) fn enumerated(&self) -> u64 {
        self.enumerated.load(Ordering::SeqCst)
    }

    /// Fetches started so far
    pub(crate) fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn fetched_keys(&self) -> Vec<String> {
        self.fetched_keys.lock().unwrap().clone()
    }

    /// Keys fetched more than once
    pub(crate) fn duplicate_fetches(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.fetched_keys()
            .into_iter()
            .filter(|k| !seen.insert(k.clone()))
            .collect()
    }
}

#[async_trait]
impl ResourceFetcher for StubFetcher {
    async fn enumerate_tasks(&self) -> Result<BoxStream<'static, Task>> {
        let keys = self.store.unprocessed_keys(&self.marker).await?;
        let enumerated = self.enumerated.clone();
        let tasks = keys
            .into_iter()
            .map(|key| Task::keyed(format!("stub://{}/{key}", self.marker), key));
        Ok(stream::iter(tasks.collect::<Vec<_>>())
            .inspect(move |_| {
                enumerated.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn fetch(&self, mut task: Task) -> Task {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let key = task.source_key().unwrap_or_default().to_string();
        let delay = self.key_delays.get(&key).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.fetched_keys.lock().unwrap().push(key.clone());
        match self.replies.get(&key).copied().unwrap_or(self.default_reply) {
            Reply::Records(count) => task.mark_fetched((0..count).map(|i| {
                json!({"id": format!("{key}-{i}"), "parent": key})
                    .as_object()
                    .cloned()
                    .unwrap()
            })),
            Reply::Fault => task.mark_failed(&FetchError::Status { status: 503 }),
            Reply::Panic => panic!("stub fetch of key {key} panicked"),
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        task
    }
}

//! Core types for scrape-pipeline

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One extracted record: a JSON object as returned by the resource
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Field added to every fetched record, holding the URL it came from
pub const SOURCE_URL_FIELD: &str = "source_url";

/// Identifies which "processed" flag a set of source keys is tracked under.
///
/// A key is unprocessed for a marker while its `(collection, key, attribute)`
/// row in the store has `processed = 0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgressMarker {
    /// Collection the keys belong to (e.g. "school")
    pub collection: String,
    /// Boolean attribute tracked for those keys (e.g. "department_scraped")
    pub attribute: String,
}

impl ProgressMarker {
    /// Create a new marker
    pub fn new(collection: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            attribute: attribute.into(),
        }
    }
}

impl std::fmt::Display for ProgressMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.collection, self.attribute)
    }
}

/// Where a task is in its (single) transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Not fetched yet
    #[default]
    Pending,
    /// Fetched successfully (possibly with zero records)
    Fetched,
    /// The fetch raised a fault
    Failed,
}

/// One unit of fetch work and its outcome.
///
/// Created by a fetcher during enumeration, completed exactly once by
/// [`mark_fetched`](Task::mark_fetched) or [`mark_failed`](Task::mark_failed),
/// and read-only afterwards.
#[derive(Clone, Debug)]
pub struct Task {
    source_key: Option<String>,
    target: String,
    records: Vec<Record>,
    state: TaskState,
}

impl Task {
    /// Task correlated with a source key
    pub fn keyed(target: impl Into<String>, source_key: impl Into<String>) -> Self {
        Self {
            source_key: Some(source_key.into()),
            target: target.into(),
            records: Vec::new(),
            state: TaskState::Pending,
        }
    }

    /// Task with no correlated key (one page of a listing)
    pub fn unkeyed(target: impl Into<String>) -> Self {
        Self {
            source_key: None,
            target: target.into(),
            records: Vec::new(),
            state: TaskState::Pending,
        }
    }

    /// Key this task marks as processed on success
    pub fn source_key(&self) -> Option<&str> {
        self.source_key.as_deref()
    }

    /// Fully resolved request URL
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Records extracted by the fetch
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Take the records out, leaving the task empty
    pub(crate) fn take_records(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// True iff the fetch raised a fault
    pub fn is_failed(&self) -> bool {
        self.state == TaskState::Failed
    }

    /// Append fetched records, tagging each with the task's URL.
    pub fn mark_fetched(&mut self, records: impl IntoIterator<Item = Record>) {
        debug_assert_eq!(
            self.state,
            TaskState::Pending,
            "task {} completed twice",
            self.target
        );
        for mut record in records {
            record.insert(
                SOURCE_URL_FIELD.to_string(),
                serde_json::Value::String(self.target.clone()),
            );
            self.records.push(record);
        }
        self.state = TaskState::Fetched;
    }

    /// Mark the task failed and log the fault. Never raises.
    pub fn mark_failed(&mut self, fault: &FetchError) {
        debug_assert_eq!(
            self.state,
            TaskState::Pending,
            "task {} completed twice",
            self.target
        );
        tracing::error!(
            url = %self.target,
            source_key = self.source_key.as_deref().unwrap_or("-"),
            timeout = fault.is_timeout(),
            error = %fault,
            "fetch failed"
        );
        self.state = TaskState::Failed;
    }
}

/// Counters reported when a run completes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Tasks fetched (successful or not)
    pub requests: u64,
    /// Tasks whose fetch failed
    pub errors: u64,
    /// Records committed to the store
    pub records_persisted: u64,
    /// Source keys marked processed
    pub keys_marked: u64,
    /// Flushes performed, including no-op flushes
    pub flushes: u64,
}

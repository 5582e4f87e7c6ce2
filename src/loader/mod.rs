//! Pipeline orchestration
//!
//! A [`Loader`] runs one resource end to end:
//! 1. ask the fetcher for the task stream
//! 2. hand it to an [`ExecutionStrategy`], which fetches tasks and appends
//!    the successful ones to the persister
//! 3. flush once more and report a [`RunSummary`]
//!
//! Fetch faults are counted and otherwise ignored. Only a failed pagination
//! probe or a failed batch commit aborts a run.
//!
//! ## Strategies
//!
//! - [`Sequential`]: one task at a time, in enumeration order
//! - [`WorkerPool`]: fixed fetch workers behind a bounded queue, one persist worker
//! - [`BoundedAsync`]: semaphore-limited fetch units, results in completion order

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{PipelineConfig, Strategy};
use crate::error::Result;
use crate::fetcher::ResourceFetcher;
use crate::persister::BatchPersister;
use crate::types::{RunSummary, Task};

mod bounded;
mod sequential;
mod worker_pool;

pub use bounded::BoundedAsync;
pub use sequential::Sequential;
pub use worker_pool::WorkerPool;

/// Request and fault counters shared by every stage of a run
#[derive(Debug, Default)]
pub struct RunCounters {
    requests: AtomicU64,
    errors: AtomicU64,
}

impl RunCounters {
    /// Count one completed fetch
    pub fn record(&self, task: &Task) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if task.is_failed() {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Completed fetches so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Failed fetches so far
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }
}

/// What a strategy needs besides the task stream and the persister
#[derive(Clone)]
pub struct RunContext {
    /// Fetcher the tasks came from
    pub fetcher: Arc<dyn ResourceFetcher>,
    /// Shared counters
    pub counters: Arc<RunCounters>,
    /// Stop submitting after this many tasks
    pub max_task_count: Option<u64>,
}

impl RunContext {
    /// Whether `count` has reached the cutoff
    pub fn cutoff_reached(&self, count: u64) -> bool {
        self.max_task_count.is_some_and(|max| count >= max)
    }
}

/// Drives tasks from the stream through `fetch` into the persister.
///
/// Implementations must fetch each task at most once, append each successful
/// task exactly once, and record every fetch in the counters. The final flush
/// belongs to the [`Loader`]; a strategy hands the persister back unflushed.
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Run every task (up to the cutoff) and return the persister
    async fn execute(
        &self,
        ctx: RunContext,
        tasks: BoxStream<'static, Task>,
        persister: BatchPersister,
    ) -> Result<BatchPersister>;
}

/// Strategy selected by the pipeline settings
pub fn strategy_for(config: &PipelineConfig) -> Box<dyn ExecutionStrategy> {
    match config.strategy {
        Strategy::Sequential => Box::new(Sequential),
        Strategy::WorkerPool => Box::new(WorkerPool::new(
            config.concurrency,
            config.fetch_queue_capacity(),
        )),
        Strategy::BoundedAsync => Box::new(BoundedAsync::new(config.concurrency)),
    }
}

/// Hand a completed task to the persister unless its fetch failed
pub(crate) async fn route(persister: &mut BatchPersister, task: Task) -> Result<()> {
    if task.is_failed() {
        return Ok(());
    }
    persister.append(task).await
}

/// Runs one resource through fetch, persist and final flush
pub struct Loader {
    name: String,
    fetcher: Arc<dyn ResourceFetcher>,
    persister: BatchPersister,
    strategy: Box<dyn ExecutionStrategy>,
    max_task_count: Option<u64>,
}

impl Loader {
    /// Create a loader with the strategy the settings select
    pub fn new(
        name: impl Into<String>,
        fetcher: Arc<dyn ResourceFetcher>,
        persister: BatchPersister,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            persister,
            strategy: strategy_for(config),
            max_task_count: config.max_task_count,
        }
    }

    /// Replace the strategy
    pub fn with_strategy(mut self, strategy: Box<dyn ExecutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Run to completion.
    ///
    /// # Errors
    /// Returns the discovery error of the fetcher or the first commit error;
    /// no final flush happens in that case.
    pub async fn run(self) -> Result<RunSummary> {
        let Loader {
            name,
            fetcher,
            persister,
            strategy,
            max_task_count,
        } = self;

        tracing::info!(
            resource = %name,
            strategy = strategy.name(),
            max_task_count,
            "run started"
        );

        let tasks = fetcher.enumerate_tasks().await.inspect_err(|e| {
            tracing::error!(resource = %name, error = %e, "task enumeration failed");
        })?;

        let counters = Arc::new(RunCounters::default());
        let ctx = RunContext {
            fetcher,
            counters: counters.clone(),
            max_task_count,
        };

        let mut persister = strategy
            .execute(ctx, tasks, persister)
            .await
            .inspect_err(|e| {
                tracing::error!(resource = %name, error = %e, "run aborted");
            })?;
        persister.flush().await?;

        let stats = persister.stats();
        let summary = RunSummary {
            requests: counters.requests(),
            errors: counters.errors(),
            records_persisted: stats.records_written,
            keys_marked: stats.keys_marked,
            flushes: stats.flushes,
        };

        tracing::info!(
            resource = %name,
            requests = summary.requests,
            errors = summary.errors,
            records = summary.records_persisted,
            keys_marked = summary.keys_marked,
            flushes = summary.flushes,
            "run finished"
        );

        Ok(summary)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

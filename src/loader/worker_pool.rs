use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::{MAX_CONCURRENCY, MAX_FETCH_QUEUE_CAPACITY};
use crate::error::{Error, Result};
use crate::persister::BatchPersister;
use crate::types::Task;

use super::{ExecutionStrategy, RunContext};

/// Fixed pool of fetch workers feeding one persist worker.
///
/// The producer blocks once `queue_capacity` tasks are waiting. The cutoff
/// compares *completed* requests after each push, so tasks already queued
/// when it triggers still run and the final count may exceed
/// `max_task_count`.
///
/// If a worker panics, every remaining worker is aborted and awaited before
/// the error is returned, so nothing touches the store after the run ends.
#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
}

impl WorkerPool {
    /// Create a pool; both sizes are clamped to their configurable range
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers: workers.clamp(1, MAX_CONCURRENCY),
            queue_capacity: queue_capacity.clamp(1, MAX_FETCH_QUEUE_CAPACITY),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for WorkerPool {
    fn name(&self) -> &'static str {
        "worker_pool"
    }

    async fn execute(
        &self,
        ctx: RunContext,
        mut tasks: BoxStream<'static, Task>,
        persister: BatchPersister,
    ) -> Result<BatchPersister> {
        let (fetch_tx, fetch_rx) = mpsc::channel::<Task>(self.queue_capacity);
        let fetch_rx = Arc::new(Mutex::new(fetch_rx));
        let (persist_tx, persist_rx) = mpsc::unbounded_channel::<Task>();

        let persist_worker = spawn_persist_worker(persister, persist_rx);

        let mut fetch_workers = JoinSet::new();
        for id in 0..self.workers {
            fetch_workers.spawn(fetch_worker(
                id,
                ctx.clone(),
                fetch_rx.clone(),
                persist_tx.clone(),
            ));
        }
        // Workers hold the only receiver handles and persist senders now
        drop(fetch_rx);
        drop(persist_tx);

        tracing::debug!(
            workers = self.workers,
            queue_capacity = self.queue_capacity,
            "worker pool started"
        );

        while !ctx.cutoff_reached(ctx.counters.requests()) {
            let Some(task) = tasks.next().await else {
                break;
            };
            if fetch_tx.send(task).await.is_err() {
                // Every fetch worker has exited
                tracing::warn!("fetch queue closed before enumeration finished");
                break;
            }
        }

        // Close the fetch queue and let the workers drain it
        drop(fetch_tx);
        while let Some(joined) = fetch_workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "fetch worker panicked; stopping pool");
                fetch_workers.shutdown().await;
                persist_worker.abort();
                // The pending batch is dropped uncommitted
                let _ = persist_worker.await;
                return Err(Error::Pipeline(format!("fetch worker panicked: {}", e)));
            }
        }

        // Fetch workers dropped their persist senders, which closes the persist queue
        persist_worker
            .await
            .map_err(|e| Error::Pipeline(format!("persist worker panicked: {}", e)))?
    }
}

async fn fetch_worker(
    id: usize,
    ctx: RunContext,
    queue: Arc<Mutex<mpsc::Receiver<Task>>>,
    persist_tx: mpsc::UnboundedSender<Task>,
) {
    loop {
        // The lock is held only while waiting for the next task
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let task = ctx.fetcher.fetch(task).await;
        ctx.counters.record(&task);
        if task.is_failed() {
            continue;
        }
        if persist_tx.send(task).is_err() {
            tracing::warn!(worker = id, "persist worker stopped; fetch worker exiting");
            break;
        }
    }
    tracing::trace!(worker = id, "fetch worker finished");
}

fn spawn_persist_worker(
    mut persister: BatchPersister,
    mut persist_rx: mpsc::UnboundedReceiver<Task>,
) -> JoinHandle<Result<BatchPersister>> {
    tokio::spawn(async move {
        while let Some(task) = persist_rx.recv().await {
            persister.append(task).await?;
        }
        Ok(persister)
    })
}

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::MAX_CONCURRENCY;
use crate::error::{Error, Result};
use crate::persister::BatchPersister;
use crate::types::Task;

use super::{ExecutionStrategy, RunContext, route};

/// One spawned unit per task, at most `concurrency` fetching at a time.
///
/// Results are routed on the driver as units finish, so records reach the
/// store in completion order rather than enumeration order.
#[derive(Clone, Copy, Debug)]
pub struct BoundedAsync {
    concurrency: usize,
}

impl BoundedAsync {
    /// Create the strategy; `concurrency` is clamped to `1..=MAX_CONCURRENCY`
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for BoundedAsync {
    fn name(&self) -> &'static str {
        "bounded_async"
    }

    async fn execute(
        &self,
        ctx: RunContext,
        mut tasks: BoxStream<'static, Task>,
        mut persister: BatchPersister,
    ) -> Result<BatchPersister> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut units: JoinSet<Result<Task>> = JoinSet::new();
        let mut submitted: u64 = 0;

        while !ctx.cutoff_reached(submitted) {
            let Some(task) = tasks.next().await else {
                break;
            };
            submitted += 1;

            let fetcher = ctx.fetcher.clone();
            let semaphore = semaphore.clone();
            units.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Pipeline(format!("fetch semaphore closed: {}", e)))?;
                Ok(fetcher.fetch(task).await)
            });
        }

        tracing::debug!(
            submitted,
            concurrency = self.concurrency,
            "all fetch units submitted"
        );

        while let Some(joined) = units.join_next().await {
            let task = joined
                .map_err(|e| Error::Pipeline(format!("fetch unit panicked: {}", e)))??;
            ctx.counters.record(&task);
            // On error the JoinSet is dropped, which aborts the remaining units
            route(&mut persister, task).await?;
        }

        Ok(persister)
    }
}

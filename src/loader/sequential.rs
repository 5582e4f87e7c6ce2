use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::persister::BatchPersister;
use crate::types::Task;

use super::{ExecutionStrategy, RunContext, route};

/// Fetch then route each task in enumeration order
#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

#[async_trait]
impl ExecutionStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    async fn execute(
        &self,
        ctx: RunContext,
        mut tasks: BoxStream<'static, Task>,
        mut persister: BatchPersister,
    ) -> Result<BatchPersister> {
        while !ctx.cutoff_reached(ctx.counters.requests()) {
            let Some(task) = tasks.next().await else {
                break;
            };
            let task = ctx.fetcher.fetch(task).await;
            ctx.counters.record(&task);
            route(&mut persister, task).await?;
        }
        Ok(persister)
    }
}


use std::sync::Arc;

use crate::config::{PipelineConfig, SinkConfig, Strategy};
use crate::loader::Loader;
use crate::persister::BatchPersister;
use crate::test_support::{MemoryStore, StubFetcher};
use crate::types::ProgressMarker;

const ALL_STRATEGIES: [Strategy; 3] = [
    Strategy::Sequential,
    Strategy::WorkerPool,
    Strategy::BoundedAsync,
];

fn marker() -> ProgressMarker {
    ProgressMarker::new("school", "department_scraped")
}

fn sink() -> SinkConfig {
    SinkConfig {
        collection: "department".into(),
        key_field: Some("id".into()),
        seeds: vec![],
    }
}

fn pipeline(strategy: Strategy, flush_threshold: usize) -> PipelineConfig {
    PipelineConfig {
        strategy,
        flush_threshold,
        ..Default::default()
    }
}

fn numbered_keys(n: usize) -> Vec<String> {
    (1..=n).map(|i| i.to_string()).collect()
}

fn store_with(keys: &[String]) -> Arc<MemoryStore> {
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    Arc::new(MemoryStore::with_keys(&marker(), &keys))
}

fn loader(store: &Arc<MemoryStore>, fetcher: &Arc<StubFetcher>, config: &PipelineConfig) -> Loader {
    let persister = BatchPersister::new(
        store.clone(),
        sink(),
        Some(marker()),
        config.flush_threshold,
    );
    Loader::new("departments", fetcher.clone(), persister, config)
}

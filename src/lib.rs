//! # scrape-pipeline
//!
//! Resumable fetch-and-persist pipeline for paginated or key-driven JSON APIs.
//!
//! ## Design Philosophy
//!
//! scrape-pipeline is designed to be:
//! - **Resumable** - Every source key carries a persisted "processed" flag; re-runs skip finished work
//! - **Transactional** - Records and the flags they complete are committed together or not at all
//! - **Bounded** - Concurrency and buffering are capped by configuration
//! - **Library-first** - No CLI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use scrape_pipeline::{Config, Scraper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::myedu("https://www.myedu.com/adms");
//!     let scraper = Scraper::new(config).await?;
//!
//!     // Schools seed departments, departments seed courses and professors
//!     for (resource, summary) in scraper.run_all().await? {
//!         println!("{resource}: {} requests, {} errors", summary.requests, summary.errors);
//!     }
//!
//!     scraper.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Task enumeration and HTTP fetching
pub mod fetcher;
/// Pipeline orchestration and execution strategies
pub mod loader;
/// Batched transactional persistence
pub mod persister;
/// Configured entry point
pub mod scraper;
/// Core types
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{
    Config, HttpConfig, KeySource, PipelineConfig, ResourceConfig, SinkConfig, Strategy,
};
pub use db::{Database, RecordStore};
pub use error::{DatabaseError, Error, FetchError, Result};
pub use fetcher::{HttpClient, KeyedFetcher, PaginatedFetcher, ResourceFetcher};
pub use loader::{BoundedAsync, ExecutionStrategy, Loader, Sequential, WorkerPool};
pub use persister::{BatchPersister, PersistStats};
pub use scraper::Scraper;
pub use types::{ProgressMarker, Record, RunSummary, Task, TaskState};

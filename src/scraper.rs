//! Entry point that wires configuration, database, HTTP client and loaders.

use std::sync::Arc;

use crate::config::{Config, KeySource, ResourceConfig};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetcher::{self, HttpClient};
use crate::loader::Loader;
use crate::persister::BatchPersister;
use crate::types::{ProgressMarker, RunSummary};

/// Runs configured resources against one database
pub struct Scraper {
    config: Config,
    db: Arc<Database>,
    client: HttpClient,
}

impl Scraper {
    /// Validate `config`, open the database and build the HTTP client
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the database cannot be
    /// opened or migrated, or the HTTP client cannot be created
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let db = Database::new(&config.persistence.database_path).await?;
        Self::with_database(config, Arc::new(db))
    }

    /// Build a scraper over an already open database
    pub fn with_database(config: Config, db: Arc<Database>) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::new(&config.http)?;
        Ok(Self { config, db, client })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared database handle
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Build the loader for one resource
    pub fn loader(&self, name: &str) -> Result<Loader> {
        let resource = self
            .config
            .resource(name)
            .ok_or_else(|| Error::UnknownResource(name.to_string()))?;
        Ok(self.build_loader(resource))
    }

    fn build_loader(&self, resource: &ResourceConfig) -> Loader {
        let pipeline = resource.effective_pipeline(&self.config.pipeline);
        let marker = match &resource.source {
            KeySource::Keyed { marker } => Some(marker.clone()),
            KeySource::Paginated => None,
        };

        let fetcher = fetcher::for_resource(resource, self.client.clone(), self.db.clone());
        let persister = BatchPersister::new(
            self.db.clone(),
            resource.sink.clone(),
            marker,
            pipeline.flush_threshold,
        );
        Loader::new(resource.name.as_str(), fetcher, persister, pipeline)
    }

    /// Run one resource by name
    pub async fn run_resource(&self, name: &str) -> Result<RunSummary> {
        self.loader(name)?.run().await
    }

    /// Run every resource in declared order, stopping at the first error
    pub async fn run_all(&self) -> Result<Vec<(String, RunSummary)>> {
        let mut summaries = Vec::with_capacity(self.config.resources.len());
        for resource in &self.config.resources {
            let summary = self.build_loader(resource).run().await?;
            summaries.push((resource.name.clone(), summary));
        }
        Ok(summaries)
    }

    /// Register source keys as unprocessed, e.g. to start a keyed resource
    /// without running the stage that normally seeds it
    pub async fn seed_keys(&self, marker: &ProgressMarker, keys: &[String]) -> Result<u64> {
        let registered = self.db.register_source_keys(marker, keys).await?;
        tracing::info!(marker = %marker, registered, "source keys seeded");
        Ok(registered)
    }

    /// Close the database pool
    pub async fn close(self) {
        self.db.pool().close().await;
    }
}

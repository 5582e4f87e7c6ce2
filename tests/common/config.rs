//! Test configuration helpers for creating scrapers against a mock API

use scrape_pipeline::config::PersistenceConfig;
use scrape_pipeline::{Config, Scraper, Strategy};
use tempfile::TempDir;
use wiremock::MockServer;

/// Base path of the mock API, mirroring the real deployment
pub const API_PATH: &str = "/adms";

/// Configuration for the school directory API served by `server`
pub fn myedu_config(server: &MockServer, temp_dir: &TempDir, strategy: Strategy) -> Config {
    let mut config = Config::myedu(&format!("{}{}", server.uri(), API_PATH));
    config.persistence = PersistenceConfig {
        database_path: temp_dir.path().join("scrape.db"),
    };
    config.pipeline.strategy = strategy;
    config.pipeline.flush_threshold = 3;
    config
}

/// Create a scraper with its own temporary database
///
/// Returns the scraper and temp directory (keep temp_dir alive for test duration)
pub async fn create_scraper(server: &MockServer, strategy: Strategy) -> (Scraper, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = myedu_config(server, &temp_dir, strategy);
    let scraper = Scraper::new(config)
        .await
        .expect("Failed to create scraper");
    (scraper, temp_dir)
}

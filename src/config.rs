//! Configuration types for scrape-pipeline

use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::types::ProgressMarker;

/// Placeholder replaced by the source key in keyed request templates
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Upper bound for `concurrency`
pub const MAX_CONCURRENCY: usize = 1024;

/// Upper bound for the worker-pool fetch queue capacity
pub const MAX_FETCH_QUEUE_CAPACITY: usize = 1 << 16;

/// Which execution strategy drives tasks through the pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fetch and persist one task at a time, in enumeration order
    #[default]
    Sequential,
    /// Fixed pool of fetch workers feeding a single persist worker
    WorkerPool,
    /// Semaphore-bounded fetch units collected in completion order
    BoundedAsync,
}

/// Per-pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Stop submitting tasks after this many (None = no cutoff)
    #[serde(default)]
    pub max_task_count: Option<u64>,

    /// Concurrent fetches for the worker-pool and bounded-async strategies (default: 5)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Fetch queue capacity is `concurrency * queue_multiplier` (default: 3)
    #[serde(default = "default_queue_multiplier")]
    pub queue_multiplier: usize,

    /// Number of successful tasks that triggers a flush (default: 100)
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Execution strategy (default: sequential)
    #[serde(default)]
    pub strategy: Strategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_task_count: None,
            concurrency: default_concurrency(),
            queue_multiplier: default_queue_multiplier(),
            flush_threshold: default_flush_threshold(),
            strategy: Strategy::default(),
        }
    }
}

impl PipelineConfig {
    /// Capacity of the worker-pool fetch queue
    pub fn fetch_queue_capacity(&self) -> usize {
        self.concurrency
            .saturating_mul(self.queue_multiplier)
            .min(MAX_FETCH_QUEUE_CAPACITY)
    }

    /// Check the numeric settings
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(Error::config(
                "concurrency",
                format!("concurrency must be at most {}", MAX_CONCURRENCY),
            ));
        }
        if self.queue_multiplier == 0 {
            return Err(Error::config(
                "queue_multiplier",
                "queue_multiplier must be at least 1",
            ));
        }
        match self.concurrency.checked_mul(self.queue_multiplier) {
            Some(capacity) if capacity <= MAX_FETCH_QUEUE_CAPACITY => {}
            _ => {
                return Err(Error::config(
                    "queue_multiplier",
                    format!(
                        "concurrency * queue_multiplier must be at most {}",
                        MAX_FETCH_QUEUE_CAPACITY
                    ),
                ));
            }
        }
        if self.flush_threshold == 0 {
            return Err(Error::config(
                "flush_threshold",
                "flush_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

/// HTTP client settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// How a resource enumerates its tasks
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeySource {
    /// Single listing, split into pages discovered by a probe request
    Paginated,
    /// One task per source key still unprocessed under `marker`
    Keyed {
        /// Flag that selects and later marks the keys
        marker: ProgressMarker,
    },
}

/// Where fetched records are written
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Collection name for stored records
    pub collection: String,

    /// Record field holding the record's own key (e.g. "department_id")
    #[serde(default)]
    pub key_field: Option<String>,

    /// Attributes registered as unprocessed for each stored record's key
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// One fetchable resource
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Unique resource name
    pub name: String,

    /// Request URL; keyed resources contain `{key}`
    pub request_template: String,

    /// Dotted path to the records in the response body (e.g. "result.Department")
    pub response_key_path: String,

    /// Task enumeration mode
    pub source: KeySource,

    /// Record destination
    pub sink: SinkConfig,

    /// Overrides the global pipeline settings for this resource
    #[serde(default)]
    pub pipeline: Option<PipelineConfig>,
}

impl ResourceConfig {
    /// Check the template and sink settings
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("name", "resource name must not be empty"));
        }
        if self.sink.collection.trim().is_empty() {
            return Err(Error::config(
                "sink.collection",
                format!("resource '{}' has an empty sink collection", self.name),
            ));
        }
        if !self.sink.seeds.is_empty() && self.sink.key_field.is_none() {
            return Err(Error::config(
                "sink.key_field",
                format!(
                    "resource '{}' seeds {:?} but has no key_field",
                    self.name, self.sink.seeds
                ),
            ));
        }

        let has_placeholder = self.request_template.contains(KEY_PLACEHOLDER);
        match &self.source {
            KeySource::Keyed { .. } if !has_placeholder => {
                return Err(Error::config(
                    "request_template",
                    format!(
                        "keyed resource '{}' needs a {} placeholder",
                        self.name, KEY_PLACEHOLDER
                    ),
                ));
            }
            KeySource::Paginated if has_placeholder => {
                return Err(Error::config(
                    "request_template",
                    format!(
                        "paginated resource '{}' must not contain {}",
                        self.name, KEY_PLACEHOLDER
                    ),
                ));
            }
            _ => {}
        }

        validate_http_url(&self.request_template.replace(KEY_PLACEHOLDER, "0"))
            .map_err(|reason| Error::config("request_template", reason))
    }

    /// Settings in effect for this resource
    pub fn effective_pipeline<'a>(&'a self, global: &'a PipelineConfig) -> &'a PipelineConfig {
        self.pipeline.as_ref().unwrap_or(global)
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./scrape-pipeline.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Default pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Storage settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Resources, in the order `run_all` processes them
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl Config {
    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate pipeline settings and every resource
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        if self.http.timeout.is_zero() {
            return Err(Error::config("http.timeout", "timeout must be positive"));
        }

        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            resource.validate()?;
            if let Some(pipeline) = &resource.pipeline {
                pipeline.validate()?;
            }
            if !seen.insert(resource.name.as_str()) {
                return Err(Error::config(
                    "resources",
                    format!("duplicate resource name '{}'", resource.name),
                ));
            }
        }
        Ok(())
    }

    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// The school directory API: school listing, then departments per school,
    /// then courses and professors per department.
    pub fn myedu(api_url: &str) -> Self {
        let api_url = api_url.trim_end_matches('/');
        let school_marker = ProgressMarker::new("school", "department_scraped");
        let course_marker = ProgressMarker::new("department", "course_scraped");
        let professor_marker = ProgressMarker::new("department", "professor_scraped");

        let resources = vec![
            ResourceConfig {
                name: "schools".into(),
                request_template: format!("{api_url}/school/"),
                response_key_path: "result.School".into(),
                source: KeySource::Paginated,
                sink: SinkConfig {
                    collection: "school".into(),
                    key_field: Some("school_id".into()),
                    seeds: vec![school_marker.attribute.clone()],
                },
                pipeline: None,
            },
            ResourceConfig {
                name: "departments".into(),
                request_template: format!("{api_url}/school/{KEY_PLACEHOLDER}/department/"),
                response_key_path: "result.Department".into(),
                source: KeySource::Keyed {
                    marker: school_marker,
                },
                sink: SinkConfig {
                    collection: "department".into(),
                    key_field: Some("department_id".into()),
                    seeds: vec![
                        course_marker.attribute.clone(),
                        professor_marker.attribute.clone(),
                    ],
                },
                pipeline: None,
            },
            ResourceConfig {
                name: "courses".into(),
                request_template: format!(
                    "{api_url}/department/{KEY_PLACEHOLDER}/course/"
                ),
                response_key_path: "result.Course".into(),
                source: KeySource::Keyed {
                    marker: course_marker,
                },
                sink: SinkConfig {
                    collection: "course".into(),
                    key_field: Some("course_id".into()),
                    seeds: vec![],
                },
                pipeline: None,
            },
            ResourceConfig {
                name: "professors".into(),
                request_template: format!(
                    "{api_url}/department/{KEY_PLACEHOLDER}/professor/"
                ),
                response_key_path: "result.Professor".into(),
                source: KeySource::Keyed {
                    marker: professor_marker,
                },
                sink: SinkConfig {
                    collection: "professor".into(),
                    key_field: Some("professor_id".into()),
                    seeds: vec![],
                },
                pipeline: None,
            },
        ];

        Self {
            resources,
            ..Default::default()
        }
    }
}

/// Accept only absolute http(s) URLs with a host.
fn validate_http_url(url_str: &str) -> std::result::Result<(), String> {
    let parsed =
        url::Url::parse(url_str).map_err(|e| format!("invalid URL '{}': {}", url_str, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "URL scheme '{}' is not allowed; only http and https are supported",
                scheme
            ));
        }
    }
    if parsed.host_str().is_none() {
        return Err(format!("URL '{}' has no host", url_str));
    }
    Ok(())
}

// Default value functions
fn default_concurrency() -> usize {
    5
}

fn default_queue_multiplier() -> usize {
    3
}

fn default_flush_threshold() -> usize {
    100
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    concat!("scrape-pipeline/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("scrape-pipeline.db")
}

// Duration serialization helper (as whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

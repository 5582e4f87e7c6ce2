//! HTTP client shared by all fetchers.

use serde_json::Value;

use crate::config::HttpConfig;
use crate::error::{FetchError, Result};

/// Thin wrapper over `reqwest::Client` that issues one JSON `GET` per call
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    /// Build a client with the configured timeout and user agent
    ///
    /// # Errors
    /// Returns error if the underlying client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { inner })
    }

    /// `GET` a URL and decode the body as JSON.
    ///
    /// Non-2xx responses are faults; the body is not read in that case.
    pub async fn get_json(&self, url: &str) -> std::result::Result<Value, FetchError> {
        tracing::trace!(url, "GET");

        let response = self.inner.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

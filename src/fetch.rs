//! Fetch client for the remote facts API
//!
//! One request shape: `GET <endpoint>?number=<count>`, answered with a JSON
//! array of `{"fact": "..."}` objects. Each decoded fact gets a fresh local id.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::fact::{self, Fact};
use crate::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://dog-facts-api.herokuapp.com/api/v1/resources/dogs";
pub const DEFAULT_COUNT: u32 = 25;

/// Where and how much to fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub endpoint: String,
    pub count: u32,
    /// Request timeout; `None` keeps the HTTP client's default
    pub timeout_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            count: DEFAULT_COUNT,
            timeout_secs: None,
        }
    }
}

/// Anything that can produce a batch of new facts.
///
/// The view model depends on this rather than on [`FetchClient`], so tests
/// and alternative sources can be swapped in.
#[async_trait]
pub trait FactSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Fact>>;
}

/// HTTP client for the facts API
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    config: FetchConfig,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        reqwest::Url::parse(&config.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", config.endpoint, e)))?;
        if config.count == 0 {
            return Err(Error::Config("count must be at least 1".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch one batch of facts.
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies are
    /// logged here and returned as errors.
    pub async fn fetch(&self) -> Result<Vec<Fact>> {
        tracing::debug!("GET {}?number={}", self.config.endpoint, self.config.count);

        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[("number", self.config.count)])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error fetching facts: {}", e);
                Error::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Unexpected status code from facts API: {}", status);
            return Err(Error::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!("Error reading facts response: {}", e);
            Error::Http(e)
        })?;

        let facts = fact::decode_facts(&body).map_err(|e| {
            tracing::error!("Failed to decode facts: {}", e);
            e
        })?;

        tracing::info!("Fetched {} facts", facts.len());
        Ok(facts)
    }

    /// Fetch in the background and hand the facts to `completion`.
    ///
    /// `completion` runs exactly once on success and never on failure; the
    /// failure is only logged. Must be called from within a tokio runtime.
    pub fn fetch_then<F>(&self, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(Vec<Fact>) + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move {
            if let Ok(facts) = client.fetch().await {
                completion(facts);
            }
        })
    }
}

#[async_trait]
impl FactSource for FetchClient {
    async fn fetch(&self) -> Result<Vec<Fact>> {
        FetchClient::fetch(self).await
    }
}

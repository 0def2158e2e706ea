use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use super::{SearchProvider, SearchRequest, SearchResponse};
use crate::error::SearchError;

pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Backoff schedule for retryable search failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Retry immediately; used by tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based): 2^attempt
    /// seconds clamped to `[min_delay, max_delay]`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = Duration::from_secs(1u64 << attempt.min(16));
        exp.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Configuration for the Tavily search client
#[derive(Debug, Clone)]
pub struct TavilyConfig {
    pub api_key: String,
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// "basic" or "advanced"
    pub search_depth: String,
    pub retry: RetryPolicy,
}

impl TavilyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            timeout: Duration::from_secs(60),
            search_depth: "advanced".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Tavily search API client
pub struct TavilyClient {
    client: Client,
    config: TavilyConfig,
}

impl TavilyClient {
    pub fn new(config: TavilyConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn has_api_key(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    async fn search_once(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let payload = TavilyRequest {
            api_key: &self.config.api_key,
            query: &request.query,
            search_depth: &self.config.search_depth,
            include_answer: true,
            max_results: request.max_results,
            time_range: request.time_range.as_str(),
            include_domains: request.include_domains.as_deref().filter(|d| !d.is_empty()),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Network(format!("request timeout: {}", e))
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SearchError::Decode(e.to_string()))?;

        if let Some(error) = body.get("error") {
            let message = match error {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(body).map_err(|e| SearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        info!(
            "Searching Tavily for '{}' (max_results={})",
            request.query, request.max_results
        );

        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            match self.search_once(request).await {
                Ok(response) => {
                    info!(
                        "Found {} results for '{}'",
                        response.results.len(),
                        request.query
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        "Search for '{}' failed (attempt {} of {}): {}; retrying in {:?}",
                        request.query, attempt, policy.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "tavily"
    }

    fn is_configured(&self) -> bool {
        self.has_api_key()
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    max_results: usize,
    time_range: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::models::TimeRange;

/// One search round-trip as the aggregator issues it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    pub include_domains: Option<Vec<String>>,
    pub time_range: TimeRange,
}

/// A provider hit before normalization; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl RawSearchHit {
    pub fn new(title: &str, url: &str, content: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            url: Some(url.to_string()),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<RawSearchHit>,
}

/// Capability boundary for web search
///
/// Implementations apply their own retry/backoff before returning an error.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Whether credentials are present
    fn is_configured(&self) -> bool {
        true
    }
}

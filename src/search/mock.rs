use async_trait::async_trait;
use tracing::info;

use super::{RawSearchHit, SearchProvider, SearchRequest, SearchResponse};
use crate::error::SearchError;

/// Search provider returning the same two canned articles for every query,
/// for running without API keys
#[derive(Debug, Default, Clone)]
pub struct MockSearchProvider;

impl MockSearchProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn canned_results() -> Vec<RawSearchHit> {
        vec![
            RawSearchHit::new(
                "Critical RCE Vulnerability 'LogLeak' Discovered in LogIt Library",
                "https://mock-news.com/article1",
                "Major vulnerability found in popular 'LogIt' library. All users are advised to update immediately. The vulnerability, dubbed 'LogLeak', allows for remote code execution.",
            ),
            RawSearchHit::new(
                "CloudCorp Announces Major Data Breach, Millions of Records Exposed",
                "https://mock-security.net/breach-announcement",
                "Massive data breach at 'CloudCorp' exposes millions of user records. The breach was discovered on Monday and is believed to have been carried out by the 'DataWraiths' hacking group.",
            ),
        ]
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        info!("Mock search for '{}'", request.query);
        Ok(SearchResponse {
            results: Self::canned_results()
                .into_iter()
                .take(request.max_results)
                .collect(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{QuerySpec, TimeRange};
    use crate::search::SearchAggregator;

    #[tokio::test]
    async fn test_mock_results_only_under_first_query() {
        let aggregator = SearchAggregator::new(Arc::new(MockSearchProvider::new()));
        let queries = vec![QuerySpec::new("one"), QuerySpec::new("two")];

        let sources = aggregator.collect(&queries, 5, TimeRange::Day).await.unwrap();

        assert_eq!(sources.get("one").map(|r| r.len()), Some(2));
        assert_eq!(sources.get("two").map(|r| r.len()), Some(0));
    }
}

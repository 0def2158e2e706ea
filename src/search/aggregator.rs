use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use super::{RawSearchHit, SearchProvider, SearchRequest};
use crate::error::SearchError;
use crate::models::{QuerySpec, SearchResult, Sources, TimeRange};

/// Maximum characters kept from a result title
pub const MAX_TITLE_CHARS: usize = 160;

/// Maximum characters kept from a result snippet
pub const MAX_CONTENT_CHARS: usize = 600;

/// Fans a query list out to a search provider and merges the results
#[derive(Clone)]
pub struct SearchAggregator {
    provider: Arc<dyn SearchProvider>,
}

impl SearchAggregator {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    /// Run every query in order, keeping each URL only under the first query
    /// that returned it.
    ///
    /// A failing query is logged and recorded with no results. The only
    /// error is an empty query list.
    pub async fn collect(
        &self,
        queries: &[QuerySpec],
        max_per_query: usize,
        default_time_range: TimeRange,
    ) -> Result<Sources, SearchError> {
        if queries.is_empty() {
            return Err(SearchError::Config("no search queries configured".to_string()));
        }

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut sources = Sources::new();

        for spec in queries {
            if spec.q.trim().is_empty() {
                warn!("Skipping empty query");
                continue;
            }

            let request = SearchRequest {
                query: spec.q.clone(),
                max_results: max_per_query,
                include_domains: spec.include_domains.clone(),
                time_range: spec.time_range.unwrap_or(default_time_range),
            };

            let results = match self.provider.search(&request).await {
                Ok(response) => response
                    .results
                    .iter()
                    .filter_map(normalize_hit)
                    .filter(|result| seen_urls.insert(result.url.clone()))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    error!("Failed to search for query '{}': {}", spec.q, e);
                    Vec::new()
                }
            };

            info!("Collected {} unique results for '{}'", results.len(), spec.q);
            sources.insert(spec.q.clone(), results);
        }

        info!("Total unique results collected: {}", sources.total_results());
        Ok(sources)
    }
}

/// Truncate and flatten a provider hit; hits without a URL are dropped
pub fn normalize_hit(hit: &RawSearchHit) -> Option<SearchResult> {
    let url = hit.url.as_deref().filter(|u| !u.is_empty())?;

    let title: String = hit
        .title
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();

    let content: String = hit
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(MAX_CONTENT_CHARS)
        .collect();

    Some(SearchResult {
        title,
        url: url.to_string(),
        content,
    })
}

/// Render collected sources as the markdown context document
pub fn format_context_as_markdown(sources: &Sources) -> String {
    let mut lines = Vec::new();

    for entry in sources.iter() {
        lines.push(format!("### Query: {}", entry.query));

        if entry.results.is_empty() {
            lines.push("- No results found".to_string());
        } else {
            for item in &entry.results {
                lines.push(format!(
                    "- {} — {} [source]({})",
                    item.title,
                    item.content.replace('\n', " "),
                    item.url
                ));
            }
        }

        lines.push(String::new());
    }

    lines.join("\n")
}

/// Keep only results whose title or content mentions one of `keywords`
pub fn filter_by_keywords(sources: &Sources, keywords: &[&str], case_sensitive: bool) -> Sources {
    let fold = |s: &str| -> String {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let keywords: Vec<String> = keywords.iter().map(|k| fold(*k)).collect();

    let mut filtered = Sources::new();
    for entry in sources.iter() {
        let kept = entry
            .results
            .iter()
            .filter(|r| {
                let title = fold(r.title.as_str());
                let content = fold(r.content.as_str());
                keywords
                    .iter()
                    .any(|k| title.contains(k.as_str()) || content.contains(k.as_str()))
            })
            .cloned()
            .collect();
        filtered.insert(entry.query.clone(), kept);
    }
    filtered
}

use tracing::{error, info};

use crate::models::{PipelineState, QuerySpec, StateUpdate, TimeRange};
use crate::search::{format_context_as_markdown, SearchAggregator};

/// Collect news for every configured query and render the context document
pub async fn collect_info(
    state: &PipelineState,
    aggregator: &SearchAggregator,
    queries: &[QuerySpec],
    max_per_query: usize,
    default_time_range: TimeRange,
) -> StateUpdate {
    if state.has_error() {
        return StateUpdate::none();
    }

    match aggregator
        .collect(queries, max_per_query, default_time_range)
        .await
    {
        Ok(sources) => {
            let context = format_context_as_markdown(&sources);
            let total = sources.total_results();
            let query_count = sources.len();

            info!(
                "Collected {} news articles from {} queries",
                total, query_count
            );

            StateUpdate {
                sources: Some(sources),
                context_document: Some(context),
                ..Default::default()
            }
            .log(format!(
                "[collect_info] Found news from {} queries, {} total results.",
                query_count, total
            ))
        }
        Err(e) => {
            error!("Failed to collect news: {}", e);
            StateUpdate::failure(
                "tavily_error",
                &e,
                format!("[collect_info] EXCEPTION {}", e),
            )
        }
    }
}

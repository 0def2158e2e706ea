pub mod config;
pub mod error;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod stages;
pub mod text;

pub use config::{AgentConfig, SlideFormat};
pub use error::{ConfigError, LlmError, PipelineError, RenderError, SearchError};
pub use io::{prune_old_outputs, validate_slide_markdown, RenderOutcome, SlideRenderer};
pub use llm::{GeminiClient, GeminiConfig, LanguageModel, MockLanguageModel};
pub use models::{Evaluation, PipelineState, QuerySpec, SearchResult, Sources, StateUpdate, TimeRange};
pub use pipeline::{route_after_eval, Pipeline, PipelineConfig, PipelineSummary, Route, Stage};
pub use search::{MockSearchProvider, SearchAggregator, SearchProvider, TavilyClient, TavilyConfig};
pub use text::{normalize_slides, MarpHeader};

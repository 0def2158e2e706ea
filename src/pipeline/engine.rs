use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{route_after_eval, Edge, Stage};
use crate::config::{AgentConfig, SlideFormat};
use crate::error::PipelineError;
use crate::llm::{GeminiClient, GeminiConfig, LanguageModel, MockLanguageModel};
use crate::models::{default_queries, PipelineState, QuerySpec, StateUpdate, TimeRange, DEFAULT_TOPIC};
use crate::search::{MockSearchProvider, SearchAggregator, SearchProvider, TavilyClient, TavilyConfig};
use crate::stages::{collect_info, evaluate_slides, make_outline, make_toc, write_slides};
use crate::text::MarpHeader;

/// Configuration for a pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Evaluate invocations before the deck is accepted regardless of score
    pub max_attempts: u32,
    /// Stage steps allowed in one run
    pub recursion_limit: usize,
    pub max_results_per_query: usize,
    /// Applied to queries without their own time range
    pub default_time_range: TimeRange,
    pub queries: Vec<QuerySpec>,
    pub header: MarpHeader,
    pub slide_format: SlideFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            recursion_limit: 60,
            max_results_per_query: 5,
            default_time_range: TimeRange::Day,
            queries: default_queries(),
            header: MarpHeader::default(),
            slide_format: SlideFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with `max_attempts` reviews, raising the step limit so every
    /// retry fits
    pub fn for_attempts(max_attempts: u32) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts,
            recursion_limit: defaults.recursion_limit.max(steps_for_attempts(max_attempts)),
            ..defaults
        }
    }
}

/// Stage steps used by a run whose every review fails: collect and outline
/// once, then toc, slides and evaluate per attempt
pub fn steps_for_attempts(max_attempts: u32) -> usize {
    2 + 3 * max_attempts as usize
}

/// Configuration overview printed by `check`
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub model: String,
    pub search_provider: String,
    pub max_attempts: u32,
    pub slide_format: SlideFormat,
    pub marp_theme: String,
    pub search_queries_count: usize,
    pub nodes: Vec<&'static str>,
}

/// Drives one state through the stage graph
pub struct Pipeline {
    search: SearchAggregator,
    llm: Arc<dyn LanguageModel>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(search: SearchAggregator, llm: Arc<dyn LanguageModel>, config: PipelineConfig) -> Self {
        Self { search, llm, config }
    }

    /// Build with real or canned providers depending on `agent.mock`.
    /// `queries` replaces the default query list when given.
    pub fn from_config(
        agent: &AgentConfig,
        queries: Option<Vec<QuerySpec>>,
    ) -> Result<Self, PipelineError> {
        let provider: Arc<dyn SearchProvider> = if agent.mock {
            Arc::new(MockSearchProvider::new())
        } else {
            let client = TavilyClient::new(TavilyConfig::new(agent.tavily_api_key.clone()))
                .map_err(|e| PipelineError::Client {
                    provider: "tavily".to_string(),
                    message: e.to_string(),
                })?;
            Arc::new(client)
        };

        let llm: Arc<dyn LanguageModel> = if agent.mock {
            Arc::new(MockLanguageModel::new())
        } else {
            let client = GeminiClient::new(GeminiConfig::new(
                agent.google_api_key.clone(),
                agent.gemini_model_name.clone(),
            ))
            .map_err(|e| PipelineError::Client {
                provider: "gemini".to_string(),
                message: e.to_string(),
            })?;
            Arc::new(client)
        };

        let config = PipelineConfig {
            queries: queries.unwrap_or_else(default_queries),
            header: MarpHeader {
                paginate: agent.marp_paginate,
                theme: agent.marp_theme.clone(),
            },
            slide_format: agent.slide_format,
            ..PipelineConfig::for_attempts(agent.max_attempts)
        };

        info!(
            "Initialized pipeline with model: {} (search: {})",
            llm.model_name(),
            provider.name()
        );

        Ok(Self::new(SearchAggregator::new(provider), llm, config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fresh state for a run; blank topics use the default briefing topic
    pub fn create_initial_state(&self, topic: Option<&str>) -> PipelineState {
        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOPIC);
        PipelineState::new(topic)
    }

    /// Run to completion, starting from a default state when `initial` is
    /// `None`. Never fails: engine errors come back as the initial state
    /// tagged with `workflow_execution_error`.
    pub async fn run(&self, initial: Option<PipelineState>) -> PipelineState {
        let initial = initial.unwrap_or_else(|| self.create_initial_state(None));
        let span = info_span!("pipeline_run", run_id = %initial.run_id, topic = %initial.topic);

        async {
            info!("Starting security news workflow execution");

            match self.execute(&initial).await {
                Ok(state) => {
                    match state.error.as_deref().filter(|e| !e.is_empty()) {
                        Some(e) => error!("Workflow completed with error: {}", e),
                        None => info!(
                            "Workflow completed successfully. Score: {:.2}",
                            state.evaluation.score
                        ),
                    }
                    state
                }
                Err(e) => {
                    error!("Workflow execution failed: {}", e);
                    initial.with_error(
                        format!("workflow_execution_error: {}", e),
                        format!("[workflow] EXECUTION FAILED: {}", e),
                    )
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Walk the stage graph from the first stage.
    ///
    /// Stops after the first stage that leaves an error on the state, or when
    /// the post-evaluation route completes.
    pub async fn execute(&self, initial: &PipelineState) -> Result<PipelineState, PipelineError> {
        let mut state = initial.clone();
        let mut next = Some(Stage::FIRST);
        let mut steps = 0;

        while let Some(stage) = next {
            steps += 1;
            if steps > self.config.recursion_limit {
                return Err(PipelineError::RecursionLimit(self.config.recursion_limit));
            }

            debug!("Running stage {}", stage.name());
            let update = self.run_stage(stage, &state).await;
            state = state.merged(update);

            if state.has_error() {
                warn!("Stopping after {}: {}", stage.name(), state.error.as_deref().unwrap_or_default());
                break;
            }

            next = match stage.edge() {
                Edge::Next(stage) => Some(stage),
                Edge::Route => {
                    let route = route_after_eval(&state, self.config.max_attempts);
                    debug!("Route after evaluation: {}", route.as_str());
                    route.target()
                }
            };
        }

        Ok(state)
    }

    async fn run_stage(&self, stage: Stage, state: &PipelineState) -> StateUpdate {
        let llm = self.llm.as_ref();

        match stage {
            Stage::Collect => {
                collect_info(
                    state,
                    &self.search,
                    &self.config.queries,
                    self.config.max_results_per_query,
                    self.config.default_time_range,
                )
                .await
            }
            Stage::Outline => make_outline(state, llm).await,
            Stage::Toc => make_toc(state, llm).await,
            Stage::Slides => write_slides(state, llm, &self.config.header).await,
            Stage::Evaluate => evaluate_slides(state, llm, self.config.max_attempts).await,
        }
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            model: self.llm.model_name().to_string(),
            search_provider: self.search.provider_name().to_string(),
            max_attempts: self.config.max_attempts,
            slide_format: self.config.slide_format,
            marp_theme: self.config.header.theme.clone(),
            search_queries_count: self.config.queries.len(),
            nodes: Stage::ALL.iter().map(Stage::name).collect(),
        }
    }

    /// Check that both providers have credentials
    pub fn validate_prerequisites(&self) -> Result<(), PipelineError> {
        if !self.search.is_configured() {
            return Err(PipelineError::Client {
                provider: self.search.provider_name().to_string(),
                message: "API key not configured".to_string(),
            });
        }
        if !self.llm.is_configured() {
            return Err(PipelineError::Client {
                provider: self.llm.model_name().to_string(),
                message: "API key not configured".to_string(),
            });
        }

        info!("All prerequisites validated successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::ScriptedModel;

    const EVAL_PROMPT: &str = "rigorously score";
    const TOC_PROMPT: &str = "table of contents";

    fn pipeline_with(llm: Arc<ScriptedModel>, config: PipelineConfig) -> Pipeline {
        Pipeline::new(
            SearchAggregator::new(Arc::new(MockSearchProvider::new())),
            llm,
            config,
        )
    }

    #[tokio::test]
    async fn test_mock_run_passes_first_attempt() {
        let agent = AgentConfig {
            mock: true,
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&agent, None).unwrap();
        let state = pipeline.run(Some(pipeline.create_initial_state(None))).await;

        assert!(!state.has_error(), "unexpected error: {:?}", state.error);
        assert_eq!(state.topic, DEFAULT_TOPIC);
        assert_eq!(state.attempts, 1);
        assert!(state.evaluation.passed);
        assert_eq!(state.toc.len(), 5);
        assert!(state.slide_markdown.starts_with("---\nmarp: true\n"));
        assert!(state.title.ends_with("_Daily_Security_Briefing"));
        let prefixes: Vec<&str> = state
            .log
            .iter()
            .map(|l| l.split(' ').next().unwrap_or_default())
            .collect();
        assert_eq!(prefixes, vec!["[collect_info]", "[outline]", "[toc]", "[slides]", "[evaluate]"]);
    }

    #[tokio::test]
    async fn test_retry_bound_always_failing() {
        let llm = Arc::new(ScriptedModel::with_evaluation(r#"{"score": 5.0, "pass": false}"#));
        let pipeline = pipeline_with(llm.clone(), PipelineConfig::default());

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert_eq!(llm.calls_matching(EVAL_PROMPT), 3);
        assert_eq!(llm.calls_matching(TOC_PROMPT), 3);
        assert_eq!(llm.calls(), 1 + 3 * 3);
        assert_eq!(state.attempts, 3);
        assert!(!state.evaluation.passed);
        assert!(!state.slide_markdown.is_empty());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_retry_feeds_back_previous_evaluation() {
        let llm = Arc::new(ScriptedModel::with_evaluation(
            r#"{"score": 6.0, "pass": false, "feedback": "Add CVE numbers"}"#,
        ));
        let pipeline = pipeline_with(llm.clone(), PipelineConfig::default());

        pipeline.run(Some(PipelineState::new("t"))).await;

        let slide_prompts: Vec<String> = llm
            .prompts()
            .into_iter()
            .filter(|p| p.contains("Marp Markdown format") && !p.contains(EVAL_PROMPT))
            .collect();
        assert_eq!(slide_prompts.len(), 3);
        assert!(!slide_prompts[0].contains("Add CVE numbers"));
        assert!(slide_prompts[1].contains("Reviewer feedback: Add CVE numbers"));
    }

    #[tokio::test]
    async fn test_unparsable_evaluation_retries_then_accepts() {
        let llm = Arc::new(ScriptedModel::with_evaluation("the slides look fine to me"));
        let pipeline = pipeline_with(llm.clone(), PipelineConfig::default());

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert_eq!(llm.calls_matching(EVAL_PROMPT), 3);
        assert_eq!(state.attempts, 3);
        assert_eq!(state.evaluation.score, 7.0);
        // The fallback passes once attempts are exhausted
        assert!(state.evaluation.passed);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_bad_toc_json_falls_back_without_error() {
        let llm = Arc::new(ScriptedModel::new(|prompt| {
            if prompt.contains(TOC_PROMPT) {
                Ok("not json".to_string())
            } else if prompt.contains(EVAL_PROMPT) {
                Ok(r#"{"score": 9.0}"#.to_string())
            } else {
                Ok("- item".to_string())
            }
        }));
        let pipeline = pipeline_with(llm, PipelineConfig::default());

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert!(state.error.is_none());
        assert_eq!(state.toc, vec!["not json"]);
        assert!(state.evaluation.passed);
    }

    #[tokio::test]
    async fn test_stage_error_halts_provider_calls() {
        let llm = Arc::new(ScriptedModel::new(|_| Err(LlmError::Api {
            status: 403,
            message: "permission denied".to_string(),
        })));
        let pipeline = pipeline_with(llm.clone(), PipelineConfig::default());

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert_eq!(llm.calls(), 1);
        assert!(state.error.as_deref().unwrap().starts_with("outline_error: "));
        // Collected context survives the failure
        assert!(!state.context_document.is_empty());
        assert!(state.toc.is_empty());
        assert_eq!(state.attempts, 0);
        assert_eq!(state.log.last().unwrap(), "[outline] EXCEPTION model API error (status 403): permission denied");
    }

    #[tokio::test]
    async fn test_collect_failure_makes_no_model_calls() {
        let llm = Arc::new(ScriptedModel::with_evaluation("{}"));
        let config = PipelineConfig {
            queries: Vec::new(),
            ..Default::default()
        };
        let pipeline = pipeline_with(llm.clone(), config);

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert!(state.error.as_deref().unwrap().starts_with("tavily_error: "));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_recursion_limit_returns_initial_state() {
        let llm = Arc::new(ScriptedModel::with_evaluation(r#"{"score": 1.0}"#));
        let config = PipelineConfig {
            recursion_limit: 3,
            ..Default::default()
        };
        let pipeline = pipeline_with(llm, config);
        let mut initial = PipelineState::new("t");
        initial.log.push("[cli] starting".to_string());

        let state = pipeline.run(Some(initial.clone())).await;

        assert_eq!(
            state.error.as_deref(),
            Some("workflow_execution_error: recursion limit of 3 stage steps reached without completing")
        );
        assert_eq!(state.log.len(), 2);
        assert_eq!(state.log[0], "[cli] starting");
        assert!(state.log[1].starts_with("[workflow] EXECUTION FAILED: "));
        assert!(state.outline.is_empty());
        assert_eq!(state.run_id, initial.run_id);
    }

    #[tokio::test]
    async fn test_many_attempts_fit_step_limit() {
        let llm = Arc::new(ScriptedModel::with_evaluation(r#"{"score": 2.0, "pass": false}"#));
        let config = PipelineConfig::for_attempts(20);
        assert_eq!(config.recursion_limit, steps_for_attempts(20));
        let pipeline = pipeline_with(llm.clone(), config);

        let state = pipeline.run(Some(PipelineState::new("t"))).await;

        assert!(state.error.is_none(), "unexpected error: {:?}", state.error);
        assert_eq!(state.attempts, 20);
        assert_eq!(llm.calls_matching(EVAL_PROMPT), 20);
        assert!(!state.slide_markdown.is_empty());
    }

    #[test]
    fn test_from_config_scales_step_limit() {
        let agent = AgentConfig {
            mock: true,
            max_attempts: 25,
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&agent, None).unwrap();
        assert_eq!(pipeline.config().max_attempts, 25);
        assert_eq!(pipeline.config().recursion_limit, 77);

        assert_eq!(PipelineConfig::for_attempts(3).recursion_limit, 60);
    }

    #[tokio::test]
    async fn test_run_without_state_uses_default_topic() {
        let llm = Arc::new(ScriptedModel::with_evaluation(r#"{"score": 9.0}"#));
        let pipeline = pipeline_with(llm, PipelineConfig::default());

        let state = pipeline.run(None).await;

        assert_eq!(state.topic, DEFAULT_TOPIC);
        assert!(state.error.is_none());
        assert!(state.evaluation.passed);
    }

    #[test]
    fn test_create_initial_state_defaults_topic() {
        let pipeline = pipeline_with(Arc::new(ScriptedModel::with_evaluation("{}")), PipelineConfig::default());
        assert_eq!(pipeline.create_initial_state(Some("  ")).topic, DEFAULT_TOPIC);
        assert_eq!(pipeline.create_initial_state(Some("Ransomware")).topic, "Ransomware");
    }

    #[test]
    fn test_summary_and_prerequisites() {
        let mock = AgentConfig {
            mock: true,
            marp_theme: "gaia".to_string(),
            ..Default::default()
        };
        let pipeline = Pipeline::from_config(&mock, Some(vec![QuerySpec::new("one")])).unwrap();

        let summary = pipeline.summary();
        assert_eq!(summary.model, "mock");
        assert_eq!(summary.search_provider, "mock");
        assert_eq!(summary.marp_theme, "gaia");
        assert_eq!(summary.search_queries_count, 1);
        assert_eq!(summary.nodes.len(), 5);
        assert!(pipeline.validate_prerequisites().is_ok());

        let unconfigured = Pipeline::from_config(&AgentConfig::default(), None).unwrap();
        assert!(matches!(
            unconfigured.validate_prerequisites(),
            Err(PipelineError::Client { ref provider, .. }) if provider == "tavily"
        ));
    }
}

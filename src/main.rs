use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use secdeck::{
    prune_old_outputs, validate_slide_markdown, AgentConfig, Pipeline, PipelineState, QuerySpec,
    SlideFormat, SlideRenderer,
};

#[derive(Parser)]
#[command(name = "secdeck")]
#[command(author, version, about = "Daily security news briefing slide generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect news, generate the deck and write it to disk
    Run {
        /// Briefing topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Rendered format: pdf, png, html, or "" for markdown only
        #[arg(long)]
        format: Option<String>,

        /// Marp theme (default, gaia, uncover, ...)
        #[arg(long)]
        theme: Option<String>,

        /// Evaluation attempts before the deck is accepted
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Directory for generated files
        #[arg(short, long, env = "SECDECK_OUTPUT_DIR", default_value = "slides")]
        output_dir: PathBuf,

        /// Keep only this many recent files in the output directory
        #[arg(long)]
        keep_recent: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Validate configuration and print the pipeline summary
    Check {
        /// Directory for generated files
        #[arg(short, long, env = "SECDECK_OUTPUT_DIR", default_value = "slides")]
        output_dir: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// JSON file with search queries (strings or {"q", "include_domains", "time_range"})
    #[arg(short, long)]
    queries: Option<PathBuf>,

    /// Use canned search and model responses instead of the real APIs
    #[arg(long, env = "SECDECK_MOCK")]
    mock: bool,

    /// Environment file to load instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// A query entry as written in the queries file
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryEntry {
    Text(String),
    Spec(QuerySpec),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            topic,
            format,
            theme,
            max_attempts,
            output_dir,
            keep_recent,
            common,
        } => {
            setup_logging(common.verbose);

            let mut config = load_config(&common)?;
            if let Some(format) = format {
                config.slide_format = format.parse::<SlideFormat>()?;
            }
            if let Some(theme) = theme {
                config.marp_theme = theme;
            }
            if let Some(max_attempts) = max_attempts {
                config.max_attempts = max_attempts;
            }
            config.validate()?;

            let queries = common.queries.as_deref().map(load_queries).transpose()?;
            let state = run_pipeline(&config, queries, topic.as_deref(), &output_dir, keep_recent).await?;

            print_result(&state);
            if state.has_error() {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Check { output_dir, common } => {
            setup_logging(common.verbose);
            check(&common, &output_dir)
        }
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(common: &CommonArgs) -> Result<AgentConfig> {
    AgentConfig::from_env(common.env_file.as_deref(), common.mock)
        .context("Failed to load configuration")
}

fn load_queries(path: &Path) -> Result<Vec<QuerySpec>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read queries file: {:?}", path))?;
    let entries: Vec<QueryEntry> =
        serde_json::from_str(&content).context("Failed to parse queries JSON")?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            QueryEntry::Text(q) => QuerySpec::new(q),
            QueryEntry::Spec(spec) => spec,
        })
        .collect())
}

async fn run_pipeline(
    config: &AgentConfig,
    queries: Option<Vec<QuerySpec>>,
    topic: Option<&str>,
    output_dir: &Path,
    keep_recent: Option<usize>,
) -> Result<PipelineState> {
    let pipeline = Pipeline::from_config(config, queries)?;
    if let Err(e) = pipeline.validate_prerequisites() {
        warn!("Prerequisite check failed: {}", e);
    }

    let mut state = pipeline.run(Some(pipeline.create_initial_state(topic))).await;

    if state.has_error() || state.slide_markdown.trim().is_empty() {
        return Ok(state);
    }

    let validation = validate_slide_markdown(&state.slide_markdown);
    for warning in &validation.warnings {
        warn!("Slide markdown: {}", warning);
    }

    let renderer = SlideRenderer::new(output_dir, config.slide_format);
    match renderer.save_and_render(&state.slide_markdown, &state.title).await {
        Ok(outcome) => {
            if let Some(warning) = &outcome.warning {
                warn!("Markdown saved but not rendered: {}", warning);
            }
            let path = outcome.rendered_path.unwrap_or(outcome.markdown_path);
            let line = format!("[save] wrote {}", path.display());
            state.record_output(path, line);
        }
        Err(e) => {
            state = state.with_error(
                format!("save_error: {:#}", e),
                format!("[save] EXCEPTION {:#}", e),
            );
        }
    }

    if let Some(keep) = keep_recent {
        report_prune(prune_old_outputs(output_dir, keep), output_dir);
    }

    Ok(state)
}

/// Cleanup failures are logged; the deck is already on disk
fn report_prune(result: Result<usize>, dir: &Path) -> usize {
    match result {
        Ok(deleted) => {
            info!("Pruned {} old files from {:?}", deleted, dir);
            deleted
        }
        Err(e) => {
            warn!("Failed to prune old outputs in {:?}: {:#}", dir, e);
            0
        }
    }
}

fn print_result(state: &PipelineState) {
    println!("\n=== RESULT ===");
    match state.error.as_deref().filter(|e| !e.is_empty()) {
        Some(error) => println!("ERROR: {}", error),
        None => {
            println!("Title    : {}", state.title);
            println!(
                "Slide    : {}",
                state
                    .output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
            println!("Score    : {:.2}", state.evaluation.score);
            println!("Passed   : {}", state.evaluation.passed);
        }
    }

    println!("\n-- LOG --");
    for line in &state.log {
        println!("{}", line);
    }
}

fn check(common: &CommonArgs, output_dir: &Path) -> Result<()> {
    let config = load_config(common)?;
    let queries = common.queries.as_deref().map(load_queries).transpose()?;
    let pipeline = Pipeline::from_config(&config, queries)?;

    let renderer = SlideRenderer::new(output_dir, config.slide_format);
    let report = serde_json::json!({
        "pipeline": pipeline.summary(),
        "output": renderer.output_info(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    pipeline
        .validate_prerequisites()
        .context("Prerequisites not met")?;
    info!("Configuration OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_accepts_output_dir() {
        let cli = Cli::try_parse_from(["secdeck", "check", "--output-dir", "decks", "--mock"]).unwrap();
        match cli.command {
            Commands::Check { output_dir, common } => {
                assert_eq!(output_dir, PathBuf::from("decks"));
                assert!(common.mock);
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_prune_failure_is_not_fatal() {
        let deleted = report_prune(Err(anyhow::anyhow!("permission denied")), Path::new("slides"));
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn test_mock_run_saves_and_prunes() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AgentConfig {
            mock: true,
            slide_format: SlideFormat::Markdown,
            ..Default::default()
        };

        let state = run_pipeline(&config, None, None, dir.path(), Some(5)).await.unwrap();

        assert!(!state.has_error(), "unexpected error: {:?}", state.error);
        let path = state.output_path.clone().unwrap();
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
        assert!(state.log.last().unwrap().starts_with("[save] wrote "));
    }
}

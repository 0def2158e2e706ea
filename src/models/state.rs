use std::path::PathBuf;

use serde::Serialize;

use super::{Evaluation, Sources};

/// Topic used when the caller does not supply one
pub const DEFAULT_TOPIC: &str = "Daily Cybersecurity Threat Briefing";

/// The record threaded through every stage of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineState {
    /// Identifier for tracing this run
    pub run_id: String,
    /// Briefing subject, fixed for the run
    pub topic: String,
    /// Search results by query (write-once, set by collect)
    pub sources: Sources,
    /// Markdown rendering of `sources` (write-once, set by collect)
    pub context_document: String,
    /// Key topics (write-once, set by outline)
    pub outline: Vec<String>,
    /// Chapters; regenerated on retry
    pub toc: Vec<String>,
    /// Normalized slide document; regenerated on retry
    pub slide_markdown: String,
    /// Latest review; overwritten on retry
    pub evaluation: Evaluation,
    /// Number of evaluate invocations so far
    pub attempts: u32,
    /// Tagged fatal error; once set no further provider calls happen
    pub error: Option<String>,
    /// Append-only human-readable trace
    pub log: Vec<String>,
    pub title: String,
    pub output_path: Option<PathBuf>,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            sources: Sources::new(),
            context_document: String::new(),
            outline: Vec::new(),
            toc: Vec::new(),
            slide_markdown: String::new(),
            evaluation: Evaluation::default(),
            attempts: 0,
            error: None,
            log: Vec::new(),
            title: String::new(),
            output_path: None,
        }
    }

    /// True when a stage has recorded a non-empty error
    pub fn has_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Produce the next snapshot by applying a stage's partial update.
    /// Log lines are appended; every other present field overwrites.
    pub fn merged(&self, update: StateUpdate) -> Self {
        let mut next = self.clone();

        if let Some(sources) = update.sources {
            next.sources = sources;
        }
        if let Some(context) = update.context_document {
            next.context_document = context;
        }
        if let Some(outline) = update.outline {
            next.outline = outline;
        }
        if let Some(toc) = update.toc {
            next.toc = toc;
        }
        if let Some(slides) = update.slide_markdown {
            next.slide_markdown = slides;
        }
        if let Some(title) = update.title {
            next.title = title;
        }
        if let Some(evaluation) = update.evaluation {
            next.evaluation = evaluation;
        }
        if let Some(attempts) = update.attempts {
            next.attempts = attempts;
        }
        if let Some(error) = update.error {
            next.error = Some(error);
        }
        next.log.extend(update.log);

        next
    }

    /// Copy of this state carrying an error and a trace line
    pub fn with_error(&self, error: impl Into<String>, log_line: impl Into<String>) -> Self {
        self.merged(StateUpdate::default().error(error).log(log_line))
    }

    /// Record where the rendered artifact was written
    pub fn record_output(&mut self, path: PathBuf, log_line: impl Into<String>) {
        self.output_path = Some(path);
        self.log.push(log_line.into());
    }
}

/// Fields a stage changes; `None` leaves the current value in place
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub sources: Option<Sources>,
    pub context_document: Option<String>,
    pub outline: Option<Vec<String>>,
    pub toc: Option<Vec<String>>,
    pub slide_markdown: Option<String>,
    pub title: Option<String>,
    pub evaluation: Option<Evaluation>,
    pub attempts: Option<u32>,
    pub error: Option<String>,
    pub log: Vec<String>,
}

impl StateUpdate {
    /// An update that changes nothing
    pub fn none() -> Self {
        Self::default()
    }

    /// A failed stage: tagged error plus a trace line
    pub fn failure(tag: &str, message: impl std::fmt::Display, log_line: impl Into<String>) -> Self {
        Self::default()
            .error(format!("{}: {}", tag, message))
            .log(log_line)
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.log.push(line.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

//! Error types for the briefing pipeline.
//!
//! Provider and engine failures are `thiserror` enums. Stage functions turn
//! them into tagged strings on the pipeline state, so none of these escape a
//! pipeline run. The binary wraps everything else in `anyhow`.

use std::path::PathBuf;

/// Search provider failure
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Transport failure or timeout; retried by the client
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with an error status or error payload
    #[error("search API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded
    #[error("failed to decode search response: {0}")]
    Decode(String),

    /// The request could not be issued as configured
    #[error("search configuration error: {0}")]
    Config(String),
}

impl SearchError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Network(_) => true,
            SearchError::Api { status, .. } => *status == 429 || *status >= 500,
            SearchError::Decode(_) | SearchError::Config(_) => false,
        }
    }
}

/// Language-model provider failure
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode model response: {0}")]
    Decode(String),

    #[error("model returned no text content")]
    EmptyResponse,

    #[error("model client configuration error: {0}")]
    Config(String),
}

/// Invalid or missing configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "missing required environment variables: {}. Set them in your .env file or environment",
        .0.join(", ")
    )]
    MissingVars(Vec<String>),

    #[error("invalid {name}: {message}")]
    Invalid { name: String, message: String },

    #[error("failed to read {path:?}: {message}")]
    File { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failure of the engine itself rather than of a stage
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// More stage steps than the configured limit
    #[error("recursion limit of {0} stage steps reached without completing")]
    RecursionLimit(usize),

    /// A provider client could not be constructed
    #[error("failed to build {provider} client: {message}")]
    Client { provider: String, message: String },
}

/// Slide rendering failure
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("marp CLI not found. Install with 'npm install -g @marp-team/marp-cli'")]
    MarpNotFound,

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("marp rendering timed out after {0} seconds")]
    Timeout(u64),

    #[error("marp rendering failed: {0}")]
    Failed(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_error_retryable() {
        assert!(SearchError::Network("reset".into()).is_retryable());
        assert!(SearchError::Api { status: 503, message: String::new() }.is_retryable());
        assert!(SearchError::Api { status: 429, message: String::new() }.is_retryable());
        assert!(!SearchError::Api { status: 401, message: String::new() }.is_retryable());
        assert!(!SearchError::Decode("bad".into()).is_retryable());
    }

    #[test]
    fn test_missing_vars_message() {
        let err = ConfigError::MissingVars(vec!["GOOGLE_API_KEY".into(), "TAVILY_API_KEY".into()]);
        assert!(err.to_string().contains("GOOGLE_API_KEY, TAVILY_API_KEY"));
    }
}

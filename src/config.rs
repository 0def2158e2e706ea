use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ConfigError;
use crate::llm::DEFAULT_MODEL;

/// Output format handed to the Marp CLI; `Markdown` skips rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideFormat {
    #[default]
    Pdf,
    Png,
    Html,
    Markdown,
}

impl SlideFormat {
    /// Marp CLI flag and file extension, `None` for markdown-only output
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            SlideFormat::Pdf => Some("pdf"),
            SlideFormat::Png => Some("png"),
            SlideFormat::Html => Some("html"),
            SlideFormat::Markdown => None,
        }
    }
}

impl FromStr for SlideFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(SlideFormat::Pdf),
            "png" => Ok(SlideFormat::Png),
            "html" => Ok(SlideFormat::Html),
            "" | "md" | "markdown" => Ok(SlideFormat::Markdown),
            other => Err(ConfigError::invalid(
                "SLIDE_FORMAT",
                format!("'{}'. Must be one of: pdf, png, html, or empty", other),
            )),
        }
    }
}

impl fmt::Display for SlideFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().unwrap_or(""))
    }
}

/// Settings for one agent process
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub google_api_key: String,
    pub tavily_api_key: String,
    pub gemini_model_name: String,
    pub slide_format: SlideFormat,
    pub marp_theme: String,
    pub marp_paginate: bool,
    pub max_attempts: u32,
    /// Use canned providers instead of the real APIs
    pub mock: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            google_api_key: String::new(),
            tavily_api_key: String::new(),
            gemini_model_name: DEFAULT_MODEL.to_string(),
            slide_format: SlideFormat::default(),
            marp_theme: "default".to_string(),
            marp_paginate: true,
            max_attempts: 3,
            mock: false,
        }
    }
}

impl AgentConfig {
    /// Load from the process environment after reading `env_file` (or `./.env`
    /// when present). API keys are only required when `mock` is false.
    pub fn from_env(env_file: Option<&Path>, mock: bool) -> Result<Self, ConfigError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::File {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok(), mock)
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F, mock: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let google_api_key = var("GOOGLE_API_KEY");
        let tavily_api_key = var("TAVILY_API_KEY");

        if !mock {
            let missing: Vec<String> = [
                ("GOOGLE_API_KEY", &google_api_key),
                ("TAVILY_API_KEY", &tavily_api_key),
            ]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();

            if !missing.is_empty() {
                return Err(ConfigError::MissingVars(missing));
            }
        }

        let defaults = Self::default();

        let max_attempts = match var("MAX_ATTEMPTS") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("MAX_ATTEMPTS", format!("'{}' is not a number", raw)))?,
            None => defaults.max_attempts,
        };

        let config = Self {
            google_api_key: google_api_key.unwrap_or_default(),
            tavily_api_key: tavily_api_key.unwrap_or_default(),
            gemini_model_name: lookup("GEMINI_MODEL_NAME").unwrap_or(defaults.gemini_model_name),
            slide_format: lookup("SLIDE_FORMAT")
                .map(|s| s.parse::<SlideFormat>())
                .transpose()?
                .unwrap_or_default(),
            marp_theme: lookup("MARP_THEME").unwrap_or(defaults.marp_theme),
            marp_paginate: lookup("MARP_PAGINATE")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.marp_paginate),
            max_attempts,
            mock,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini_model_name.trim().is_empty() {
            return Err(ConfigError::invalid("GEMINI_MODEL_NAME", "cannot be empty"));
        }
        if self.marp_theme.trim().is_empty() {
            return Err(ConfigError::invalid("MARP_THEME", "cannot be empty"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("MAX_ATTEMPTS", "must be at least 1"));
        }
        Ok(())
    }
}

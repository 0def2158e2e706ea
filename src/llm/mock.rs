use async_trait::async_trait;
use tracing::info;

use super::{LanguageModel, LlmResponse};
use crate::error::LlmError;

pub const MOCK_OUTLINE_RESPONSE: &str = "
## Outline

1.  **Critical RCE Vulnerability 'LogLeak' in LogIt Library** https://mock-news.com/article1
2.  **Massive Data Breach at CloudCorp** https://mock-security.net/breach-announcement
";

pub const MOCK_TOC_RESPONSE: &str = r#"```json
{"toc": ["Introduction", "LogLeak RCE in LogIt", "CloudCorp Data Breach", "Recommendations", "Conclusion"]}
```"#;

pub const MOCK_SLIDES_RESPONSE: &str = "
---
marp: true
theme: default
paginate: true
---

# Daily Cybersecurity Threat Briefing

## Critical RCE Vulnerability 'LogLeak' in LogIt Library

**A major vulnerability has been found in the popular 'LogIt' library.**

- **Vulnerability:** 'LogLeak'
- **Impact:** Remote Code Execution (RCE)
- **Action:** All users are advised to update immediately.
- Source: https://mock-news.com/article1

## Massive Data Breach at CloudCorp

**CloudCorp has announced a significant data breach affecting millions of users.**

- **Attribution:** The attack is believed to be the work of the 'DataWraiths' hacking group.
- **Status:** The breach was discovered on Monday.
- Source: https://mock-security.net/breach-announcement
";

pub const MOCK_EVALUATION_RESPONSE: &str = r#"{
  "score": 8.6,
  "subscores": {"structure": 8.5, "accuracy": 9.0, "clarity": 8.5, "conciseness": 8.2},
  "reasons": {"structure": "Clear flow", "accuracy": "Matches sources", "clarity": "Readable", "conciseness": "Tight"},
  "suggestions": ["Add a short mitigation checklist"],
  "pass": true,
  "feedback": "Solid briefing."
}"#;

const MOCK_GENERIC_RESPONSE: &str = "This is a generic mock AI response.";

/// Language model returning canned stage outputs, chosen by prompt content
#[derive(Debug, Default, Clone)]
pub struct MockLanguageModel;

impl MockLanguageModel {
    pub fn new() -> Self {
        Self
    }

    fn respond(prompt: &str) -> &'static str {
        let prompt = prompt.to_lowercase();

        if prompt.contains("rigorously score") {
            MOCK_EVALUATION_RESPONSE
        } else if prompt.contains("table of contents") {
            MOCK_TOC_RESPONSE
        } else if prompt.contains("marp markdown format") {
            MOCK_SLIDES_RESPONSE
        } else if prompt.contains("outline") {
            MOCK_OUTLINE_RESPONSE
        } else {
            MOCK_GENERIC_RESPONSE
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn invoke(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        info!("Mock model invoked ({} prompt chars)", prompt.len());
        Ok(LlmResponse {
            content: Self::respond(prompt).to_string(),
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Test double answering through a closure and recording every prompt
#[cfg(test)]
pub(crate) struct ScriptedModel {
    respond: Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedModel {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Canned answers, with `eval` replacing the evaluator's response
    pub(crate) fn with_evaluation(eval: &'static str) -> Self {
        Self::new(move |prompt| {
            if prompt.contains("rigorously score") {
                Ok(eval.to_string())
            } else {
                Ok(MockLanguageModel::respond(prompt).to_string())
            }
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn calls_matching(&self, needle: &str) -> usize {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn invoke(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt).map(|content| LlmResponse { content })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

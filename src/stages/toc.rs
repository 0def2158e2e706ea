use serde_json::Value;
use tracing::{error, info, warn};

use crate::llm::{build_toc_prompt, LanguageModel};
use crate::models::{PipelineState, StateUpdate};
use crate::text::{find_json, strip_bullets};

/// Maximum chapters kept in the table of contents
pub const MAX_TOC_ITEMS: usize = 8;

/// Chapters used when the model's answer yields none
pub const DEFAULT_TOC: [&str; 6] = [
    "Introduction",
    "Key Threats",
    "Vulnerability Analysis",
    "Breach Reports",
    "Recommendations",
    "Conclusion",
];

/// Turn the outline into the deck's chapter list
pub async fn make_toc(state: &PipelineState, llm: &dyn LanguageModel) -> StateUpdate {
    if state.has_error() {
        return StateUpdate::none();
    }

    if state.outline.is_empty() {
        warn!("No outline available for TOC generation");
        return StateUpdate::failure(
            "toc_error",
            "No outline available for TOC generation",
            "[toc] No outline available",
        );
    }

    info!("Generating table of contents");
    let prompt = build_toc_prompt(&state.outline);

    match llm.invoke(&prompt).await {
        Ok(response) => {
            let toc = parse_toc(&response.content);
            info!("Generated TOC with {} chapters", toc.len());

            StateUpdate {
                toc: Some(toc.clone()),
                ..Default::default()
            }
            .log(format!("[toc] Generated {} chapters", toc.len()))
        }
        Err(e) => {
            error!("Failed to generate TOC: {}", e);
            StateUpdate::failure("toc_error", &e, format!("[toc] EXCEPTION {}", e))
        }
    }
}

/// Read `{"toc": [...]}`, falling back to bullet lines and then to
/// [`DEFAULT_TOC`]
pub fn parse_toc(content: &str) -> Vec<String> {
    let candidate = find_json(content).unwrap_or_else(|| content.to_string());

    let mut toc = match serde_json::from_str::<Value>(&candidate) {
        Ok(Value::Object(map)) => map
            .get("toc")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        _ => {
            warn!("Failed to parse JSON response, falling back to bullet parsing");
            strip_bullets(content.lines())
        }
    };

    if toc.is_empty() {
        info!("Using default TOC structure");
        toc = DEFAULT_TOC.iter().map(|s| s.to_string()).collect();
    }

    toc.truncate(MAX_TOC_ITEMS);
    toc
}

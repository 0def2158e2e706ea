use tracing::{error, info, warn};

use crate::llm::{build_outline_prompt, LanguageModel};
use crate::models::{PipelineState, StateUpdate};
use crate::text::strip_bullets;

/// Maximum topics kept in the outline
pub const MAX_OUTLINE_ITEMS: usize = 5;

/// Ask the model for the briefing's most important topics
pub async fn make_outline(state: &PipelineState, llm: &dyn LanguageModel) -> StateUpdate {
    if state.has_error() {
        return StateUpdate::none();
    }

    if state.context_document.trim().is_empty() {
        warn!("No context available for outline generation");
        return StateUpdate::failure(
            "outline_error",
            "No news context available for outline generation",
            "[outline] No context available",
        );
    }

    info!("Generating outline from collected news");
    let prompt = build_outline_prompt(&state.context_document, &state.topic);

    match llm.invoke(&prompt).await {
        Ok(response) => {
            let outline = parse_outline(&response.content);
            info!("Generated outline with {} items", outline.len());

            StateUpdate {
                outline: Some(outline.clone()),
                ..Default::default()
            }
            .log(format!("[outline] Generated {} outline items", outline.len()))
        }
        Err(e) => {
            error!("Failed to generate outline: {}", e);
            StateUpdate::failure("outline_error", &e, format!("[outline] EXCEPTION {}", e))
        }
    }
}

/// First few bullet-stripped lines, or the whole answer when it has none
fn parse_outline(content: &str) -> Vec<String> {
    let mut items = strip_bullets(content.lines());
    items.truncate(MAX_OUTLINE_ITEMS);

    if items.is_empty() {
        vec![content.trim().to_string()]
    } else {
        items
    }
}

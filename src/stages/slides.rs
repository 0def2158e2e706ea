use tracing::{error, info, warn};

use crate::llm::{build_slides_prompt, LanguageModel};
use crate::models::{PipelineState, StateUpdate};
use crate::text::{briefing_title, normalize_slides, today_iso, MarpHeader};

/// Write the slide deck and normalize it into a Marp document.
///
/// On a retry the previous evaluation is fed back into the prompt.
pub async fn write_slides(
    state: &PipelineState,
    llm: &dyn LanguageModel,
    header: &MarpHeader,
) -> StateUpdate {
    if state.has_error() {
        return StateUpdate::none();
    }

    if state.context_document.trim().is_empty() {
        warn!("No context available for slide generation");
        return StateUpdate::failure(
            "slides_error",
            "No news context available for slide generation",
            "[slides] No context available",
        );
    }

    let title = briefing_title(&today_iso());
    let previous = (state.attempts > 0 && !state.evaluation.passed).then_some(&state.evaluation);
    if previous.is_some() {
        info!("Rewriting slides after attempt {}", state.attempts);
    }

    info!("Generating slide content");
    let prompt = build_slides_prompt(&state.context_document, &title, &state.toc, previous);

    match llm.invoke(&prompt).await {
        Ok(response) => {
            let slide_md = normalize_slides(response.content.trim(), &title, header);
            let chars = slide_md.chars().count();
            info!("Generated slide content ({} characters)", chars);

            StateUpdate {
                slide_markdown: Some(slide_md),
                title: Some(title),
                ..Default::default()
            }
            .log(format!("[slides] generated ({} chars)", chars))
        }
        Err(e) => {
            error!("Failed to generate slides: {}", e);
            StateUpdate::failure("slides_error", &e, format!("[slides] EXCEPTION {}", e))
        }
    }
}

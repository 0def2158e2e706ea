use crate::models::Evaluation;

/// Weighted rubric shown to the evaluator
pub const EVAL_GUIDE: &str = "Evaluation Criteria and Weights:
- structure(0.20): Logical flow, chapter organization, one message per slide.
- accuracy(0.30): Factual correctness based on the provided news summary.
- clarity(0.25): Clear and easy-to-understand language, appropriate use of bullet points.
- conciseness(0.25): Lack of redundancy, straight to the point.
Passing Score: score >= 8.0
";

/// JSON shape the evaluator must return
pub const EVAL_SCHEMA: &str = r#"{
  "score": number,
  "subscores": {"structure": number, "accuracy": number, "clarity": number, "conciseness": number},
  "reasons": {"structure": string, "accuracy": string, "clarity": string, "conciseness": string},
  "suggestions": [string],
  "pass": boolean,
  "feedback": string
}"#;

/// Build the prompt that picks the briefing's key topics
pub fn build_outline_prompt(context: &str, topic: &str) -> String {
    format!(
        "System: You are a senior cybersecurity analyst. Your task is to create a presentation outline based on the latest security news.

User: Based on the following \"Latest News Summary (with sources)\", identify the 5 most critical security topics for a daily briefing. Present them as a concise bulleted list. Include URLs in your points.

[Latest News Summary]
{context}

[Topic]
{topic}
"
    )
}

/// Build the prompt that turns the outline into chapter titles
pub fn build_toc_prompt(outline: &[String]) -> String {
    let items: Vec<String> = outline.iter().map(|item| format!("- {}", item)).collect();

    format!(
        "System: You are a senior cybersecurity analyst creating the table of contents for a Marp slide presentation.

User: From the following outline, create a table of contents with 5-8 chapters. Return it in JSON format as {{\"toc\": [ ... ]}}.

Outline:
{}
",
        items.join("\n")
    )
}

/// Build the slide-writing prompt.
///
/// `previous` carries the last evaluation when the deck is being rewritten
/// after a failed review.
pub fn build_slides_prompt(
    context: &str,
    title: &str,
    chapters: &[String],
    previous: Option<&Evaluation>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "System: You are a senior cybersecurity analyst creating a presentation in Marp Markdown format.
Do not wrap the output in a code block. Do not include slide separators (---).
Each slide must start with an H2 header (##). Do not write the presenter's name on the title slide.
IMPORTANT: Base your writing ONLY on the facts provided in the \"Latest News Summary\" below. Do not include information not present in the summary.

User:
Latest News Summary (with sources):
",
    );
    prompt.push_str(context);
    prompt.push_str("\n\nRequirements:\n");
    prompt.push_str(&format!("- Title (main heading on the cover): {}\n", title));
    prompt.push_str(
        "- Page 1 should only have a # heading and a short subtitle. Do not write the presenter's name.\n",
    );
    prompt.push_str("- Page 2 should be the Agenda (list the chapters).\n");
    prompt.push_str(
        "- Subsequent pages should concisely detail the latest security news. Include URLs for each item.\n",
    );
    prompt.push_str("- Every chapter must start with an H2 (##) heading.\n");

    if !chapters.is_empty() {
        prompt.push_str("\nChapters:\n");
        for (i, chapter) in chapters.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, chapter));
        }
    }

    if let Some(eval) = previous {
        prompt.push_str(&format!(
            "\nThe previous draft scored {:.1} and did not pass review.\n",
            eval.score
        ));
        if !eval.feedback.is_empty() {
            prompt.push_str(&format!("Reviewer feedback: {}\n", eval.feedback));
        }
        if !eval.suggestions.is_empty() {
            prompt.push_str("Address these suggestions:\n");
            for suggestion in &eval.suggestions {
                prompt.push_str(&format!("- {}\n", suggestion));
            }
        }
    }

    prompt
}

/// Build the scoring prompt for a rendered deck
pub fn build_evaluation_prompt(topic: &str, slides: &str) -> String {
    format!(
        "System: You are a principal security architect. You will rigorously score the following Marp slide Markdown based on the provided criteria and weights. Output JSON only.

User:
Topic: {topic}
Slides (Marp Markdown):
<<<SLIDES
{slides}
SLIDES

Evaluation Guide:
<<<EVAL
{EVAL_GUIDE}
EVAL

Return strictly this JSON schema:
{EVAL_SCHEMA}
"
    )
}

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::llm::{build_evaluation_prompt, LanguageModel};
use crate::models::{Evaluation, PipelineState, StateUpdate, PASSING_SCORE};
use crate::text::find_json;

/// Score the current deck and count the attempt.
///
/// An answer that is not a usable JSON object yields
/// [`Evaluation::fallback`], which passes only once `max_attempts` is reached.
pub async fn evaluate_slides(
    state: &PipelineState,
    llm: &dyn LanguageModel,
    max_attempts: u32,
) -> StateUpdate {
    if state.has_error() {
        info!("Skipping evaluation due to previous error");
        return StateUpdate::none();
    }

    if state.slide_markdown.trim().is_empty() {
        warn!("No slide content to evaluate");
        return StateUpdate::failure(
            "eval_error",
            "No slide content available for evaluation",
            "[evaluate] No slide content available",
        );
    }

    info!("Evaluating slide quality");
    let prompt = build_evaluation_prompt(&state.topic, &state.slide_markdown);

    let response = match llm.invoke(&prompt).await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to evaluate slides: {}", e);
            return StateUpdate::failure("eval_error", &e, format!("[evaluate] EXCEPTION {}", e));
        }
    };

    let attempts = state.attempts + 1;

    match parse_evaluation(&response.content) {
        Some(evaluation) => {
            info!(
                "Evaluation complete: score={:.2}, passed={}, attempts={}",
                evaluation.score, evaluation.passed, attempts
            );
            let line = format!(
                "[evaluate] score={:.2} pass={} attempts={}",
                evaluation.score, evaluation.passed, attempts
            );

            StateUpdate {
                evaluation: Some(evaluation),
                attempts: Some(attempts),
                ..Default::default()
            }
            .log(line)
        }
        None => {
            error!("Failed to parse evaluation response");

            StateUpdate {
                evaluation: Some(Evaluation::fallback(attempts >= max_attempts)),
                attempts: Some(attempts),
                ..Default::default()
            }
            .log(format!("[evaluate] parsing failed, attempts={}", attempts))
        }
    }
}

/// Read the reviewer's JSON answer.
///
/// Lenient about shape: `score` may be a number or numeric string and
/// defaults to 0, `pass` defaults to `score >= 8.0`, non-numeric subscores
/// are dropped. Returns `None` when there is no JSON object or the score is
/// not a number.
pub fn parse_evaluation(raw: &str) -> Option<Evaluation> {
    let candidate = find_json(raw).unwrap_or_else(|| raw.to_string());
    let Value::Object(data) = serde_json::from_str::<Value>(&candidate).ok()? else {
        return None;
    };

    let score = match data.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(value) => as_number(value)?,
    };

    let passed = match data.get("pass") {
        Some(Value::Bool(b)) => *b,
        _ => score >= PASSING_SCORE,
    };

    Some(Evaluation {
        score,
        subscores: object(&data, "subscores")
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| as_number(v).map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default(),
        reasons: object(&data, "reasons")
            .map(|m| m.iter().map(|(k, v)| (k.clone(), as_text(v))).collect())
            .unwrap_or_default(),
        suggestions: data
            .get("suggestions")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(as_text).collect())
            .unwrap_or_default(),
        passed,
        feedback: data
            .get("feedback")
            .map(|v| as_text(v).trim().to_string())
            .unwrap_or_default(),
    })
}

fn object<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    data.get(key).and_then(Value::as_object)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::ScriptedModel;

    fn state_with_slides(attempts: u32) -> PipelineState {
        let mut state = PipelineState::new("Daily");
        state.slide_markdown = "---\nmarp: true\n---\n\n# Deck\n---\n## One\n".to_string();
        state.attempts = attempts;
        state
    }

    #[test]
    fn test_parse_full_answer() {
        let eval = parse_evaluation(
            r#"Here you go:
```json
{"score": 8.4, "subscores": {"structure": 8, "accuracy": "9.5", "clarity": "n/a"},
 "reasons": {"structure": "ok"}, "suggestions": ["a", "b"], "pass": true, "feedback": "  fine  "}
```"#,
        )
        .unwrap();

        assert_eq!(eval.score, 8.4);
        assert_eq!(eval.subscores.get("structure"), Some(&8.0));
        assert_eq!(eval.subscores.get("accuracy"), Some(&9.5));
        assert!(!eval.subscores.contains_key("clarity"));
        assert_eq!(eval.reasons.get("structure").map(String::as_str), Some("ok"));
        assert_eq!(eval.suggestions, vec!["a", "b"]);
        assert!(eval.passed);
        assert_eq!(eval.feedback, "fine");
    }

    #[test]
    fn test_parse_pass_defaults_to_threshold() {
        assert!(parse_evaluation(r#"{"score": 8.0}"#).unwrap().passed);
        assert!(!parse_evaluation(r#"{"score": "7.9"}"#).unwrap().passed);
        // An explicit verdict wins over the score
        assert!(!parse_evaluation(r#"{"score": 9.0, "pass": false}"#).unwrap().passed);
        assert_eq!(parse_evaluation("{}").unwrap().score, 0.0);
    }

    #[test]
    fn test_parse_ignores_braced_note_after_answer() {
        let eval = parse_evaluation("{\"score\": 9.5, \"pass\": true}\nNote: see {appendix}").unwrap();
        assert_eq!(eval.score, 9.5);
        assert!(eval.passed);
    }

    #[test]
    fn test_parse_rejects_unusable_answers() {
        assert!(parse_evaluation("I think the slides are great").is_none());
        assert!(parse_evaluation("[1, 2]").is_none());
        assert!(parse_evaluation(r#"{"score": "high"}"#).is_none());
    }

    #[tokio::test]
    async fn test_unparsable_first_attempt_uses_fallback() {
        let llm = ScriptedModel::new(|_| Ok("definitely not json".to_string()));

        let update = evaluate_slides(&state_with_slides(0), &llm, 3).await;

        let eval = update.evaluation.unwrap();
        assert_eq!(eval.score, 7.0);
        assert!(!eval.passed);
        assert_eq!(update.attempts, Some(1));
        assert!(update.error.is_none());
        assert_eq!(update.log, vec!["[evaluate] parsing failed, attempts=1".to_string()]);
    }

    #[tokio::test]
    async fn test_unparsable_last_attempt_passes() {
        let llm = ScriptedModel::new(|_| Ok("nope".to_string()));

        let update = evaluate_slides(&state_with_slides(2), &llm, 3).await;

        assert!(update.evaluation.unwrap().passed);
        assert_eq!(update.attempts, Some(3));
    }

    #[tokio::test]
    async fn test_evaluate_increments_attempts() {
        let llm = ScriptedModel::new(|_| Ok(r#"{"score": 6.25, "pass": false, "feedback": "thin"}"#.to_string()));

        let update = evaluate_slides(&state_with_slides(1), &llm, 3).await;

        assert_eq!(update.attempts, Some(2));
        assert_eq!(update.evaluation.unwrap().feedback, "thin");
        assert_eq!(update.log, vec!["[evaluate] score=6.25 pass=false attempts=2".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluate_skipped_after_error() {
        let llm = ScriptedModel::new(|_| Ok("{}".to_string()));
        let state = state_with_slides(0).with_error("slides_error: boom", "[slides] EXCEPTION boom");

        let update = evaluate_slides(&state, &llm, 3).await;

        assert!(update.is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_evaluate_provider_failure() {
        let llm = ScriptedModel::new(|_| Err(LlmError::Network("timeout".to_string())));

        let update = evaluate_slides(&state_with_slides(0), &llm, 3).await;

        assert_eq!(update.error.as_deref(), Some("eval_error: network error: timeout"));
        assert!(update.attempts.is_none());
    }

    #[tokio::test]
    async fn test_evaluate_requires_slides() {
        let llm = ScriptedModel::new(|_| Ok("{}".to_string()));
        let update = evaluate_slides(&PipelineState::new("t"), &llm, 3).await;
        assert!(update.error.unwrap().starts_with("eval_error: "));
        assert_eq!(llm.calls(), 0);
    }
}

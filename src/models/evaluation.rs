use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Score at or above which a deck passes when the reviewer gives no explicit verdict
pub const PASSING_SCORE: f64 = 8.0;

/// Criteria the reviewer scores, in prompt order
pub const CRITERIA: [&str; 4] = ["structure", "accuracy", "clarity", "conciseness"];

/// Quality review of one generated deck
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Overall weighted score (0-10)
    pub score: f64,
    /// Per-criterion scores
    pub subscores: BTreeMap<String, f64>,
    /// Per-criterion explanations
    pub reasons: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
    pub passed: bool,
    pub feedback: String,
}

impl Evaluation {
    /// Neutral evaluation used when the reviewer's answer cannot be parsed
    pub fn fallback(passed: bool) -> Self {
        Self {
            score: 7.0,
            subscores: CRITERIA.iter().map(|c| (c.to_string(), 7.0)).collect(),
            reasons: CRITERIA
                .iter()
                .map(|c| (c.to_string(), "Unable to evaluate".to_string()))
                .collect(),
            suggestions: vec!["Review slide content manually".to_string()],
            passed,
            feedback: "Evaluation parsing failed, using default scores".to_string(),
        }
    }
}

//! The fixed stage graph.
//!
//! Stages run in order `collect -> outline -> toc -> slides -> evaluate`.
//! Evaluate is the only stage with a conditional edge, decided by
//! [`route_after_eval`].

use serde::Serialize;
use tracing::info;

use crate::models::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Collect,
    Outline,
    Toc,
    Slides,
    Evaluate,
}

/// Where control goes after a stage completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Next(Stage),
    /// Decided by [`route_after_eval`]
    Route,
}

/// Outcome of the post-evaluation decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Ok,
    Retry,
}

impl Stage {
    pub const FIRST: Stage = Stage::Collect;

    pub const ALL: [Stage; 5] = [
        Stage::Collect,
        Stage::Outline,
        Stage::Toc,
        Stage::Slides,
        Stage::Evaluate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Collect => "collect_info",
            Stage::Outline => "make_outline",
            Stage::Toc => "make_toc",
            Stage::Slides => "write_slides",
            Stage::Evaluate => "evaluate_slides",
        }
    }

    pub fn edge(&self) -> Edge {
        match self {
            Stage::Collect => Edge::Next(Stage::Outline),
            Stage::Outline => Edge::Next(Stage::Toc),
            Stage::Toc => Edge::Next(Stage::Slides),
            Stage::Slides => Edge::Next(Stage::Evaluate),
            Stage::Evaluate => Edge::Route,
        }
    }
}

impl Route {
    /// Stage to resume at, `None` when the run is complete
    pub fn target(&self) -> Option<Stage> {
        match self {
            Route::Ok => None,
            Route::Retry => Some(Stage::Toc),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Ok => "ok",
            Route::Retry => "retry",
        }
    }
}

/// Finish once attempts are exhausted or the deck passed, otherwise retry
pub fn route_after_eval(state: &PipelineState, max_attempts: u32) -> Route {
    if state.attempts >= max_attempts {
        info!("Max attempts ({}) reached, proceeding to save", max_attempts);
        return Route::Ok;
    }

    if state.evaluation.passed {
        info!("Evaluation passed, proceeding to save");
        Route::Ok
    } else {
        info!(
            "Evaluation failed (attempt {}/{}), retrying",
            state.attempts, max_attempts
        );
        Route::Retry
    }
}

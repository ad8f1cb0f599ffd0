//! Run report
//!
//! Per-model outcomes plus the aggregate classification for one pipeline
//! run. The report is recomputed fresh every run; nothing persists between
//! runs.

use serde::Serialize;
use std::time::Duration;

use crate::model::{Materialization, ModelStatus};

/// Run-level classification summarizing all per-model statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every model succeeded
    AllSucceeded,
    /// At least one model failed or was skipped
    Partial,
    /// A structural error stopped the run before execution began
    Aborted,
}

/// Terminal outcome of a single model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutcome {
    pub identity: String,
    pub materialization: Materialization,
    pub status: ModelStatus,
    /// Engine error message for failed models
    pub error: Option<String>,
    pub duration: Duration,
    /// Materialized row count, when the engine reported one
    pub rows: Option<usize>,
}

impl ModelOutcome {
    pub fn skipped(identity: impl Into<String>, materialization: Materialization) -> Self {
        Self {
            identity: identity.into(),
            materialization,
            status: ModelStatus::Skipped,
            error: None,
            duration: Duration::ZERO,
            rows: None,
        }
    }
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ModelOutcome>,
    pub outcome: RunOutcome,
    pub elapsed: Duration,
}

impl RunReport {
    /// Classify a finished run from its per-model outcomes.
    pub fn from_outcomes(outcomes: Vec<ModelOutcome>, elapsed: Duration) -> Self {
        let outcome = if outcomes
            .iter()
            .all(|o| o.status == ModelStatus::Succeeded)
        {
            RunOutcome::AllSucceeded
        } else {
            RunOutcome::Partial
        };
        Self {
            outcomes,
            outcome,
            elapsed,
        }
    }

    pub fn count(&self, status: ModelStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::AllSucceeded
    }
}

/// Human-readable duration, e.g. `1m 2s 345ms`. Milliseconds always shown.
pub fn format_elapsed(elapsed: Duration) -> String {
    let hours = elapsed.as_secs() / 3600;
    let minutes = (elapsed.as_secs() % 3600) / 60;
    let seconds = elapsed.as_secs() % 60;
    let milliseconds = elapsed.subsec_millis();

    let mut components = Vec::new();
    if hours > 0 {
        components.push(format!("{}h", hours));
    }
    if minutes > 0 {
        components.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        components.push(format!("{}s", seconds));
    }
    components.push(format!("{}ms", milliseconds));

    components.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(identity: &str, status: ModelStatus) -> ModelOutcome {
        ModelOutcome {
            identity: identity.into(),
            materialization: Materialization::Table,
            status,
            error: None,
            duration: Duration::ZERO,
            rows: None,
        }
    }

    #[test]
    fn all_succeeded() {
        let report = RunReport::from_outcomes(
            vec![
                outcome("a", ModelStatus::Succeeded),
                outcome("b", ModelStatus::Succeeded),
            ],
            Duration::ZERO,
        );
        assert_eq!(report.outcome, RunOutcome::AllSucceeded);
        assert!(report.is_success());
    }

    #[test]
    fn any_failure_or_skip_is_partial() {
        let report = RunReport::from_outcomes(
            vec![
                outcome("a", ModelStatus::Failed),
                outcome("b", ModelStatus::Skipped),
                outcome("c", ModelStatus::Succeeded),
            ],
            Duration::ZERO,
        );
        assert_eq!(report.outcome, RunOutcome::Partial);
        assert_eq!(report.count(ModelStatus::Failed), 1);
        assert_eq!(report.count(ModelStatus::Skipped), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::from_millis(42)), "42ms");
        assert_eq!(format_elapsed(Duration::from_millis(62_345)), "1m 2s 345ms");
        assert_eq!(
            format_elapsed(Duration::from_secs(3600)),
            "1h 0ms"
        );
    }
}

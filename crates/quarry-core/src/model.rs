//! Model domain types
//!
//! A model is one transformation unit: one query, one target table or view.
//! Models are constructed once per run by the loader and never mutated
//! afterwards, except for `status`, which the executor owns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Physical form in which a model's result is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    #[default]
    Table,
    View,
}

impl fmt::Display for Materialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialization::Table => write!(f, "table"),
            Materialization::View => write!(f, "view"),
        }
    }
}

/// Per-model lifecycle state, mutated only by the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl ModelStatus {
    /// Terminal states are the only ones a finished run may report.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ModelStatus::Succeeded | ModelStatus::Failed | ModelStatus::Skipped
        )
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelStatus::Pending => "pending",
            ModelStatus::Running => "running",
            ModelStatus::Succeeded => "succeeded",
            ModelStatus::Failed => "failed",
            ModelStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// A single transformation unit.
#[derive(Debug, Clone)]
pub struct Model {
    /// Stable key derived from the file path relative to the models root,
    /// extension stripped, path components joined with `.`
    pub identity: String,

    /// Originating file, read-only after load
    pub source_path: PathBuf,

    /// Declared (or defaulted) materialization kind
    pub materialization: Materialization,

    /// Original file contents
    pub raw_text: String,

    /// Macro-expanded SQL, immutable once computed. Model references are
    /// still present as markers; they are rewritten at submission time.
    pub expanded_text: String,

    /// Identities of referenced models, derived by the graph builder
    pub dependencies: BTreeSet<String>,

    /// Execution state, owned by the executor
    pub status: ModelStatus,
}

impl Model {
    /// Target object name as it appears in generated DDL. Identities contain
    /// `.` separators, so the name is always double-quoted to keep it a
    /// single unqualified identifier.
    pub fn target_name(&self) -> String {
        format!("\"{}\"", self.identity)
    }
}

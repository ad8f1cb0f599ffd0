//! Query-engine boundary

/// Failure reported by the underlying store. Carried per model; an engine
/// error never aborts sibling branches.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Result metadata for a successful submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMeta {
    /// Rows written by the statement, when the store reports a count
    pub rows: Option<usize>,
}

/// The only interface the orchestration core depends on.
#[async_trait::async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine name for diagnostics (e.g. "DuckDB")
    fn name(&self) -> &'static str;

    /// Execute a single SQL statement.
    async fn execute(&self, sql: &str) -> Result<EngineMeta, EngineError>;

    /// Execute a multi-statement script in one batch.
    async fn execute_batch(&self, sql: &str) -> Result<(), EngineError>;
}

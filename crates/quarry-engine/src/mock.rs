//! Mock query engine for testing
//!
//! Records every SQL text it receives and returns scripted failures for
//! statements matching a configured needle. No data store behind it, so
//! executor semantics (skip propagation, aggregate outcomes, submission
//! order) can be tested in isolation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::{EngineError, EngineMeta, QueryEngine};

pub struct MockEngine {
    executed: Arc<RwLock<Vec<String>>>,
    /// substring of the submitted SQL -> error message to return
    failures: HashMap<String, String>,
    /// rows reported on success
    rows: Option<usize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(RwLock::new(Vec::new())),
            failures: HashMap::new(),
            rows: Some(0),
        }
    }

    /// Fail any submission whose SQL contains `needle`. Matching a model's
    /// quoted target name (`"identity"`) scripts a failure for that model.
    pub fn with_failure(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(needle.into(), message.into());
        self
    }

    /// Report `rows` as the materialized row count on success.
    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Every SQL text received so far, in submission-completion order.
    pub async fn executed_sql(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    pub async fn execution_count(&self) -> usize {
        self.executed.read().await.len()
    }

    /// Whether any received SQL contains `needle`.
    pub async fn was_executed(&self, needle: &str) -> bool {
        self.executed.read().await.iter().any(|s| s.contains(needle))
    }

    fn scripted_failure(&self, sql: &str) -> Option<EngineError> {
        self.failures
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, message)| EngineError::Query(message.clone()))
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockEngine {
    fn clone(&self) -> Self {
        Self {
            executed: Arc::clone(&self.executed),
            failures: self.failures.clone(),
            rows: self.rows,
        }
    }
}

#[async_trait::async_trait]
impl QueryEngine for MockEngine {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&self, sql: &str) -> Result<EngineMeta, EngineError> {
        self.executed.write().await.push(sql.to_string());
        match self.scripted_failure(sql) {
            Some(err) => Err(err),
            None => Ok(EngineMeta { rows: self.rows }),
        }
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), EngineError> {
        self.executed.write().await.push(sql.to_string());
        match self.scripted_failure(sql) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

//! Execution planning
//!
//! Kahn-style topological layering: stage `i` holds every model whose
//! dependencies lie entirely in stages `< i`. Models within a stage are
//! mutually independent and eligible for concurrent execution. The
//! lexicographic tie-break within each stage makes run ordering and
//! reporting reproducible regardless of filesystem traversal order.

use quarry_core::QuarryError;

use crate::graph::DependencyGraph;

/// Ordered partition of the graph into stages of independent models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Stage → model identities, lexicographically sorted within a stage
    pub stages: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn model_count(&self) -> usize {
        self.stages.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Compute the execution plan for an acyclic graph.
///
/// Leftover nodes whose in-degree never reaches zero would mean a cycle the
/// builder failed to detect; that is an internal invariant violation, not a
/// model-tree defect, and fails with `Scheduling`.
pub fn plan(graph: &DependencyGraph) -> Result<ExecutionPlan, QuarryError> {
    let mut in_degree: Vec<usize> = (0..graph.len())
        .map(|i| graph.dependencies(i).len())
        .collect();

    let mut current: Vec<usize> = (0..graph.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut stages = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for &node in &current {
            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }

        let mut identities: Vec<String> = current
            .iter()
            .map(|&i| graph.identity(i).to_string())
            .collect();
        identities.sort();
        stages.push(identities);
        current = next;
    }

    if placed != graph.len() {
        return Err(QuarryError::Scheduling(format!(
            "{} of {} models could not be placed in any stage",
            graph.len() - placed,
            graph.len()
        )));
    }

    tracing::debug!(stages = stages.len(), models = placed, "execution plan ready");
    Ok(ExecutionPlan { stages })
}

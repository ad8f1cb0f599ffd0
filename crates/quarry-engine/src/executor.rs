//! Stage executor
//!
//! Runs the plan stage by stage. Stages are strict barriers: a stage starts
//! only after every model in the previous stage reached a terminal state,
//! because later stages read earlier stages' materialized output. Within a
//! stage, models are proven independent and run concurrently on a bounded
//! worker pool.
//!
//! Failure is local: the failing model's transitive dependents are marked
//! SKIPPED before submission and never reach the engine, while unrelated
//! branches keep running.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use quarry_compile::rewrite_refs;
use quarry_core::{Materialization, Model, ModelOutcome, ModelStatus, QuarryError, RunReport};
use quarry_graph::{DependencyGraph, ExecutionPlan};

use crate::engine::{EngineError, EngineMeta, QueryEngine};

/// Wrap a model's expanded SQL in its materialization form. Reference
/// markers resolve to the quoted target name; create-or-replace keeps
/// re-runs idempotent.
pub fn materialize_sql(model: &Model) -> Result<String, QuarryError> {
    let resolved = rewrite_refs(&model.expanded_text, |target| format!("\"{}\"", target))
        .map_err(|e| QuarryError::InvalidModelDefinition {
            path: model.source_path.display().to_string(),
            token: e.token(),
        })?;
    let body = resolved.trim().trim_end_matches(';').trim_end();
    let form = match model.materialization {
        Materialization::Table => "TABLE",
        Materialization::View => "VIEW",
    };
    Ok(format!(
        "CREATE OR REPLACE {} {} AS ({})",
        form,
        model.target_name(),
        body
    ))
}

pub struct Executor {
    engine: Arc<dyn QueryEngine>,
    workers: usize,
}

impl Executor {
    pub fn new(engine: Arc<dyn QueryEngine>, workers: usize) -> Self {
        Self {
            engine,
            workers: workers.max(1),
        }
    }

    /// Run the plan to completion. `models` must be the slice the graph was
    /// built from. Reporting order is the plan order: stage by stage,
    /// lexicographic within a stage.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        graph: &DependencyGraph,
        models: &mut [Model],
    ) -> Result<RunReport, QuarryError> {
        if plan.model_count() != models.len() {
            return Err(QuarryError::Scheduling(format!(
                "plan covers {} models but {} were loaded",
                plan.model_count(),
                models.len()
            )));
        }

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut skip: HashSet<usize> = HashSet::new();
        let mut outcomes: Vec<Option<ModelOutcome>> = vec![None; models.len()];

        for (stage_number, stage) in plan.stages.iter().enumerate() {
            tracing::debug!(stage = stage_number, models = stage.len(), "starting stage");
            let mut in_flight = Vec::new();

            for identity in stage {
                let node = graph.index_of(identity).ok_or_else(|| {
                    QuarryError::Scheduling(format!("planned model `{identity}` is not in the graph"))
                })?;

                if skip.contains(&node) {
                    models[node].status = ModelStatus::Skipped;
                    outcomes[node] = Some(ModelOutcome::skipped(
                        identity.clone(),
                        models[node].materialization,
                    ));
                    tracing::warn!(model = %identity, "skipped: upstream model failed");
                    continue;
                }

                let sql = materialize_sql(&models[node])?;
                models[node].status = ModelStatus::Running;

                let engine = Arc::clone(&self.engine);
                let semaphore = Arc::clone(&semaphore);
                let handle = tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                Err(EngineError::Connection("worker pool closed".to_string())),
                                Duration::ZERO,
                            )
                        }
                    };
                    let submission_started = Instant::now();
                    let result = engine.execute(&sql).await;
                    (result, submission_started.elapsed())
                });
                in_flight.push((node, handle));
            }

            // stage barrier: wait for every in-flight model
            for (node, handle) in in_flight {
                let (result, duration) = handle.await.map_err(|e| {
                    QuarryError::Scheduling(format!("worker task failed: {e}"))
                })?;
                outcomes[node] = Some(self.settle(node, result, duration, graph, models, &mut skip));
            }
        }

        let ordered = plan
            .stages
            .iter()
            .flatten()
            .filter_map(|identity| {
                graph
                    .index_of(identity)
                    .and_then(|node| outcomes[node].take())
            })
            .collect();
        Ok(RunReport::from_outcomes(ordered, started.elapsed()))
    }

    /// Record one model's terminal state; on failure, pre-emptively skip its
    /// transitive dependents.
    fn settle(
        &self,
        node: usize,
        result: Result<EngineMeta, EngineError>,
        duration: Duration,
        graph: &DependencyGraph,
        models: &mut [Model],
        skip: &mut HashSet<usize>,
    ) -> ModelOutcome {
        let model = &mut models[node];
        match result {
            Ok(meta) => {
                model.status = ModelStatus::Succeeded;
                tracing::info!(model = %model.identity, rows = ?meta.rows, "materialized");
                ModelOutcome {
                    identity: model.identity.clone(),
                    materialization: model.materialization,
                    status: ModelStatus::Succeeded,
                    error: None,
                    duration,
                    rows: meta.rows,
                }
            }
            Err(err) => {
                model.status = ModelStatus::Failed;
                tracing::error!(model = %model.identity, error = %err, "model failed");
                let outcome = ModelOutcome {
                    identity: model.identity.clone(),
                    materialization: model.materialization,
                    status: ModelStatus::Failed,
                    error: Some(err.to_string()),
                    duration,
                    rows: None,
                };
                for dependent in graph.downstream(node) {
                    skip.insert(dependent);
                }
                outcome
            }
        }
    }
}

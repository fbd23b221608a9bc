//! StageGraph DAG execution engine.
//!
//! Sequential mode runs stages one at a time in declaration order. Parallel
//! mode partitions stages into waves: wave `n` holds the stages whose
//! dependencies all sit in earlier waves. Every stage of a wave is spawned as
//! its own task and the whole wave is joined before the next one starts.

use super::StageSpec;
use crate::context::{PipelineContext, StageContext};
use crate::core::{ExecutionMode, ExecutionOutcome, StageStatus};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Result of executing a stage graph.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Per-stage outcomes in completion order.
    pub outcomes: Vec<ExecutionOutcome>,
    /// Total execution time.
    pub duration: Duration,
    /// Whether the run was cancelled before every stage could start.
    pub cancelled: bool,
}

impl RunReport {
    /// Number of succeeded stages.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.count(StageStatus::Succeeded)
    }

    /// Number of failed stages.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(StageStatus::Failed)
    }

    /// Number of stages that never started.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(StageStatus::Skipped)
    }

    /// The outcome of a stage, if it was reported.
    #[must_use]
    pub fn outcome(&self, stage: &str) -> Option<&ExecutionOutcome> {
        self.outcomes.iter().find(|o| o.stage == stage)
    }

    fn count(&self, status: StageStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// A directed acyclic graph of stages for execution.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// The pipeline name.
    name: String,
    /// Stage specifications in declaration order.
    stages: Vec<StageSpec>,
    /// Execution order (topologically sorted).
    execution_order: Vec<String>,
    /// Dependency waves.
    waves: Vec<Vec<String>>,
}

impl StageGraph {
    /// Creates a new stage graph. Dependencies must already be validated.
    #[must_use]
    pub fn new(name: String, stages: Vec<StageSpec>) -> Self {
        let execution_order = topological_sort(&stages);
        let waves = partition_waves(&stages, &execution_order);

        Self {
            name,
            stages,
            execution_order,
            waves,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns stage names in declaration order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Returns the specification of a stage.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns the 1-based declaration position and spec of a stage.
    fn position(&self, name: &str) -> Option<(usize, &StageSpec)> {
        self.stages
            .iter()
            .enumerate()
            .find(|(_, s)| s.name == name)
            .map(|(i, s)| (i + 1, s))
    }

    /// Returns the execution order.
    #[must_use]
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Returns the dependency waves.
    #[must_use]
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    /// Executes every stage and folds each outcome into the run.
    ///
    /// Stage failures never stop the pipeline. Once the context is cancelled
    /// no further stage starts; those stages are reported as skipped.
    pub async fn execute(&self, ctx: &Arc<PipelineContext>, mode: ExecutionMode) -> RunReport {
        let start = Instant::now();

        info!(pipeline = %self.name, %mode, stages = self.stages.len(), "Starting pipeline");
        ctx.emit(
            "pipeline.started",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "mode": mode,
                "stages": self.stages.len(),
            })),
        );

        let outcomes = match mode {
            ExecutionMode::Sequential => self.execute_sequential(ctx).await,
            ExecutionMode::Parallel => self.execute_waves(ctx).await,
        };

        let report = RunReport {
            outcomes,
            duration: start.elapsed(),
            cancelled: ctx.is_cancelled(),
        };

        info!(
            pipeline = %self.name,
            succeeded = report.success_count(),
            failed = report.failure_count(),
            skipped = report.skipped_count(),
            duration_ms = report.duration.as_secs_f64() * 1000.0,
            "Pipeline finished"
        );
        ctx.emit(
            "pipeline.completed",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "succeeded": report.success_count(),
                "failed": report.failure_count(),
                "skipped": report.skipped_count(),
                "cancelled": report.cancelled,
                "duration_ms": report.duration.as_secs_f64() * 1000.0,
            })),
        );

        report
    }

    async fn execute_sequential(&self, ctx: &Arc<PipelineContext>) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        for (position, spec) in self.stages.iter().enumerate() {
            outcomes.push(run_stage(spec, position + 1, self.stages.len(), ctx).await);
        }
        outcomes
    }

    async fn execute_waves(&self, ctx: &Arc<PipelineContext>) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(self.stages.len());
        let limit = ctx.max_parallel().map(|max| Arc::new(Semaphore::new(max)));

        for (number, wave) in self.waves.iter().enumerate() {
            if ctx.is_cancelled() {
                for name in wave {
                    if let Some((position, spec)) = self.position(name) {
                        outcomes.push(run_stage(spec, position, self.stages.len(), ctx).await);
                    }
                }
                continue;
            }

            debug!(wave = number, stages = ?wave, "Starting wave");
            ctx.emit(
                "wave.started",
                Some(serde_json::json!({ "wave": number, "stages": wave })),
            );

            let mut active_tasks = FuturesUnordered::new();
            for name in wave {
                let Some((position, spec)) = self.position(name) else {
                    continue;
                };
                let spec = spec.clone();
                let total = self.stages.len();
                let stage_name = spec.name.clone();
                let tool = spec.runner.tool().to_string();
                let task_ctx = ctx.clone();
                let limit = limit.clone();

                let handle = tokio::spawn(async move {
                    let _permit = match limit {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    run_stage(&spec, position, total, &task_ctx).await
                });
                active_tasks.push(async move { (stage_name, tool, handle.await) });
            }

            while let Some((stage_name, tool, joined)) = active_tasks.next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        error!(stage = %stage_name, error = %e, "Stage task aborted");
                        let outcome = ExecutionOutcome::failed(
                            stage_name,
                            tool,
                            Duration::ZERO,
                            format!("stage task aborted: {e}"),
                        );
                        outcomes.push(finish_stage(ctx, outcome));
                    }
                }
            }
        }

        outcomes
    }
}

/// Runs one stage, or skips it if the run is already cancelled.
///
/// `position` is the 1-based declaration index, reported for progress
/// display.
async fn run_stage(
    spec: &StageSpec,
    position: usize,
    total: usize,
    ctx: &Arc<PipelineContext>,
) -> ExecutionOutcome {
    let tool = spec.runner.tool();

    if ctx.is_cancelled() {
        let reason = ctx
            .cancellation()
            .reason()
            .unwrap_or_else(|| "cancelled".to_string());
        return finish_stage(ctx, ExecutionOutcome::skipped(&spec.name, tool, reason));
    }

    info!(stage = %spec.name, tool, "Running stage");
    ctx.emit(
        "stage.started",
        Some(serde_json::json!({
            "stage": &spec.name,
            "tool": tool,
            "position": position,
            "total": total,
        })),
    );

    let stage_ctx = StageContext::new(ctx.clone(), &spec.name, spec.timeout);
    let outcome = spec.runner.execute(&stage_ctx).await;
    finish_stage(ctx, outcome)
}

/// Reports an outcome and folds it into the run counters.
fn finish_stage(ctx: &PipelineContext, outcome: ExecutionOutcome) -> ExecutionOutcome {
    match outcome.status {
        StageStatus::Succeeded => {
            info!(stage = %outcome.stage, duration_ms = outcome.duration_ms(), "Stage succeeded");
            ctx.emit(
                "stage.completed",
                Some(serde_json::json!({
                    "stage": &outcome.stage,
                    "tool": &outcome.tool,
                    "exit_code": outcome.exit_code,
                    "duration_ms": outcome.duration_ms(),
                })),
            );
        }
        StageStatus::Failed => {
            warn!(
                stage = %outcome.stage,
                tool = %outcome.tool,
                exit_code = ?outcome.exit_code,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Stage failed"
            );
            ctx.emit(
                "stage.failed",
                Some(serde_json::json!({
                    "stage": &outcome.stage,
                    "tool": &outcome.tool,
                    "exit_code": outcome.exit_code,
                    "error": &outcome.error,
                    "duration_ms": outcome.duration_ms(),
                })),
            );
        }
        StageStatus::Skipped => {
            debug!(stage = %outcome.stage, "Stage skipped");
            ctx.emit(
                "stage.skipped",
                Some(serde_json::json!({
                    "stage": &outcome.stage,
                    "tool": &outcome.tool,
                    "reason": &outcome.error,
                })),
            );
        }
    }

    ctx.run().record(outcome.clone());
    outcome
}

/// Performs topological sort on the stage graph, visiting in declaration
/// order for determinism.
fn topological_sort(stages: &[StageSpec]) -> Vec<String> {
    fn visit(
        node: &str,
        by_name: &HashMap<&str, &StageSpec>,
        visited: &mut HashSet<String>,
        temp_visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if visited.contains(node) || temp_visited.contains(node) {
            return;
        }

        temp_visited.insert(node.to_string());

        if let Some(spec) = by_name.get(node) {
            for dep in &spec.dependencies {
                visit(dep, by_name, visited, temp_visited, result);
            }
        }

        temp_visited.remove(node);
        visited.insert(node.to_string());
        result.push(node.to_string());
    }

    let by_name: HashMap<&str, &StageSpec> = stages.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut result = Vec::new();
    let mut visited = HashSet::new();
    let mut temp_visited = HashSet::new();

    for spec in stages {
        visit(&spec.name, &by_name, &mut visited, &mut temp_visited, &mut result);
    }

    result
}

/// Groups stages by dependency depth. Stages keep declaration order within
/// a wave.
fn partition_waves(stages: &[StageSpec], order: &[String]) -> Vec<Vec<String>> {
    let by_name: HashMap<&str, &StageSpec> = stages.iter().map(|s| (s.name.as_str(), s)).collect();
    let mut depth: HashMap<&str, usize> = HashMap::new();

    for name in order {
        let Some(spec) = by_name.get(name.as_str()) else {
            continue;
        };
        let level = spec
            .dependencies
            .iter()
            .filter_map(|dep| depth.get(dep.as_str()))
            .map(|d| d + 1)
            .max()
            .unwrap_or(0);
        depth.insert(spec.name.as_str(), level);
    }

    let wave_count = depth.values().max().map_or(0, |d| d + 1);
    let mut waves = vec![Vec::new(); wave_count];
    for spec in stages {
        if let Some(&level) = depth.get(spec.name.as_str()) {
            waves[level].push(spec.name.clone());
        }
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::SuccessStage;
    use pretty_assertions::assert_eq;

    fn build_diamond() -> StageGraph {
        PipelineBuilder::new("test")
            .stage(Arc::new(SuccessStage::new("a")), &[])
            .unwrap()
            .stage(Arc::new(SuccessStage::new("b")), &["a"])
            .unwrap()
            .stage(Arc::new(SuccessStage::new("c")), &["a"])
            .unwrap()
            .stage(Arc::new(SuccessStage::new("d")), &["b", "c"])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_graph_creation() {
        let graph = build_diamond();
        assert_eq!(graph.name(), "test");
        assert_eq!(graph.stage_count(), 4);
        assert_eq!(graph.stage_names(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_topological_order() {
        let graph = build_diamond();
        let order = graph.execution_order();

        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn test_waves() {
        let graph = build_diamond();
        assert_eq!(
            graph.waves(),
            &[
                vec!["a".to_string()],
                vec!["b".to_string(), "c".to_string()],
                vec!["d".to_string()],
            ]
        );
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport {
            outcomes: vec![
                ExecutionOutcome::succeeded("a", "t", Duration::ZERO),
                ExecutionOutcome::failed("b", "t", Duration::ZERO, "exit status 2"),
                ExecutionOutcome::skipped("c", "t", "interrupt"),
            ],
            duration: Duration::ZERO,
            cancelled: true,
        };

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.outcome("b").unwrap().is_failure());
        assert!(report.outcome("z").is_none());
    }
}

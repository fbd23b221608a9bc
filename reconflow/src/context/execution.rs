//! Execution contexts shared by the pipeline and its stages.

use crate::cancellation::CancellationToken;
use crate::events::{EventSink, NoOpEventSink};
use crate::run::{Run, Target};
use crate::runner::StageRunner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// The context for one pipeline execution.
///
/// Holds the run plus everything stages share: the process runner, the event
/// sink and the cancellation token.
pub struct PipelineContext {
    /// The run being executed.
    run: Arc<Run>,
    /// Launches stage processes.
    runner: Arc<StageRunner>,
    /// Event sink for lifecycle events.
    event_sink: Arc<dyn EventSink>,
    /// Run-wide cancellation.
    cancellation: Arc<CancellationToken>,
    /// Bound on concurrently executing stages in parallel mode.
    max_parallel: Option<usize>,
}

impl PipelineContext {
    /// Creates a context with a no-op sink and a fresh token.
    #[must_use]
    pub fn new(run: Arc<Run>, runner: Arc<StageRunner>) -> Self {
        Self {
            run,
            runner,
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
            max_parallel: None,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Shares an existing cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Bounds parallel execution. Zero means unbounded; values above what a
    /// semaphore can hold are clamped.
    #[must_use]
    pub fn with_max_parallel(mut self, max: Option<usize>) -> Self {
        self.max_parallel = max
            .filter(|m| *m > 0)
            .map(|m| m.min(Semaphore::MAX_PERMITS));
        self
    }

    /// Returns the run.
    #[must_use]
    pub fn run(&self) -> &Arc<Run> {
        &self.run
    }

    /// Returns the runner.
    #[must_use]
    pub fn runner(&self) -> &StageRunner {
        &self.runner
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns the parallelism bound.
    #[must_use]
    pub const fn max_parallel(&self) -> Option<usize> {
        self.max_parallel
    }

    /// Checks if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emits an event tagged with the run id and target.
    pub fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("run_id".to_string(), serde_json::json!(self.run.id().to_string()));
            map.insert("target".to_string(), serde_json::json!(self.run.target().as_str()));
        }

        self.event_sink.emit(event_type, Some(enriched));
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("run_id", &self.run.id())
            .field("target", &self.run.target())
            .field("max_parallel", &self.max_parallel)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// The context for a single stage execution.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// The pipeline context.
    pipeline_ctx: Arc<PipelineContext>,
    /// The stage name.
    stage_name: String,
    /// Stage-specific timeout overriding the runner default.
    timeout: Option<Duration>,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        pipeline_ctx: Arc<PipelineContext>,
        stage_name: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            pipeline_ctx,
            stage_name: stage_name.into(),
            timeout,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the pipeline context.
    #[must_use]
    pub fn pipeline_ctx(&self) -> &Arc<PipelineContext> {
        &self.pipeline_ctx
    }

    /// Returns the target domain.
    #[must_use]
    pub fn target(&self) -> &Target {
        self.pipeline_ctx.run.target()
    }

    /// Returns the run output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        self.pipeline_ctx.run.output_dir()
    }

    /// Path of a file in the run output directory.
    #[must_use]
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.pipeline_ctx.run.output_file(name)
    }

    /// Returns the runner.
    #[must_use]
    pub fn runner(&self) -> &StageRunner {
        self.pipeline_ctx.runner()
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.pipeline_ctx.cancellation
    }

    /// The stage-specific timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Checks if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.pipeline_ctx.is_cancelled()
    }

    /// Emits an event tagged with this stage's name.
    pub fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let mut enriched = data.unwrap_or_else(|| serde_json::json!({}));

        if let serde_json::Value::Object(ref mut map) = enriched {
            map.insert("stage".to_string(), serde_json::json!(&self.stage_name));
        }

        self.pipeline_ctx.emit(event_type, Some(enriched));
    }
}

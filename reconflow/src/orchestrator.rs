//! Drives one run through its lifecycle.
//!
//! `Initializing` prepares directories and tools, `Running` executes the
//! pipeline, `Summarizing` aggregates the result and notifies, `Done` ends
//! the run.

use std::sync::Arc;

use tracing::info;

use crate::cancellation::CancellationToken;
use crate::config::ScannerConfig;
use crate::context::PipelineContext;
use crate::core::RunState;
use crate::environment::{Environment, PrepareReport};
use crate::errors::ReconError;
use crate::events::{EventSink, NoOpEventSink};
use crate::notify::{deliver, dispatch, Notifier, NotifyOutcome};
use crate::pipeline::{RunReport, StageGraph};
use crate::recon::{recon_pipeline, recon_registry};
use crate::run::Run;
use crate::summary::RunSummary;

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// The aggregated summary.
    pub summary: RunSummary,
    /// What bootstrap did.
    pub prepare: PrepareReport,
    /// Per-stage pipeline report.
    pub report: RunReport,
    /// Whether the completion notification went out.
    pub notification: NotifyOutcome,
}

/// Runs the scan pipeline for one target.
pub struct Orchestrator {
    environment: Environment,
    pipeline: StageGraph,
    event_sink: Arc<dyn EventSink>,
    cancellation: Arc<CancellationToken>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Orchestrator {
    /// Creates an orchestrator for the built-in recon pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline cannot be built.
    pub fn new(config: ScannerConfig) -> Result<Self, ReconError> {
        let pipeline = recon_pipeline(&config)?;
        let registry = recon_registry(&config);
        Ok(Self::with_pipeline(Environment::new(config, registry), pipeline))
    }

    /// Creates an orchestrator for an arbitrary pipeline.
    #[must_use]
    pub fn with_pipeline(environment: Environment, pipeline: StageGraph) -> Self {
        Self {
            environment,
            pipeline,
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
            notifier: None,
        }
    }

    /// Sets the event sink for bootstrap and stage events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.environment = self.environment.with_event_sink(sink.clone());
        self.event_sink = sink;
        self
    }

    /// Shares a cancellation token, typically wired to Ctrl-C.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Replaces the webhook notifier. It is still only used when the run
    /// carries an endpoint.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Returns the environment.
    #[must_use]
    pub const fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Returns the pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &StageGraph {
        &self.pipeline
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Executes the run to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directories cannot be created or the
    /// run is not in its initial state.
    pub async fn execute(&self, run: Arc<Run>) -> Result<RunResult, ReconError> {
        if run.state() != RunState::Initializing {
            return Err(crate::errors::StateError {
                from: run.state(),
                to: RunState::Running,
            }
            .into());
        }

        info!(run_id = %run.id(), target = %run.target(), mode = %run.mode(), "Preparing run");
        let prepare = self.environment.prepare(&run, &self.cancellation).await?;

        run.advance(RunState::Running)?;
        let ctx = Arc::new(
            PipelineContext::new(run.clone(), Arc::new(self.environment.runner()))
                .with_event_sink(self.event_sink.clone())
                .with_cancellation(self.cancellation.clone())
                .with_max_parallel(self.environment.config().max_parallel),
        );
        let report = self.pipeline.execute(&ctx, run.mode()).await;

        run.advance(RunState::Summarizing)?;
        let summary = RunSummary::from_run(&run);
        let notification = match (run.webhook(), &self.notifier) {
            (Some(_), Some(notifier)) => deliver(notifier.as_ref(), &summary).await,
            (endpoint, _) => dispatch(endpoint, &summary).await,
        };

        run.advance(RunState::Done)?;
        info!(
            run_id = %run.id(),
            successful = summary.successful,
            failed = summary.failed,
            duration = %summary.duration,
            "Run finished"
        );

        Ok(RunResult {
            summary,
            prepare,
            report,
            notification,
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("environment", &self.environment)
            .field("pipeline", &self.pipeline.name())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionMode;
    use crate::errors::NotifyError;
    use crate::pipeline::PipelineBuilder;
    use crate::run::Target;
    use crate::testing::{FailingStage, SuccessStage};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn notify(&self, _summary: &RunSummary) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn orchestrator(root: &Path) -> Orchestrator {
        let config = ScannerConfig::from_home(root).without_install();
        let pipeline = PipelineBuilder::new("test")
            .stage(Arc::new(SuccessStage::new("one")), &[])
            .unwrap()
            .stage(Arc::new(FailingStage::new("two", "exit status 1")), &[])
            .unwrap()
            .build()
            .unwrap();
        Orchestrator::with_pipeline(Environment::new(config, ToolRegistry::new()), pipeline)
    }

    fn run(root: &Path, webhook: Option<&str>) -> Arc<Run> {
        Arc::new(
            Run::new(
                Target::parse(Some("example.com")).unwrap(),
                &root.join("bounty_output"),
                ExecutionMode::Sequential,
            )
            .with_webhook(webhook.map(String::from)),
        )
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let run = run(dir.path(), None);

        let result = orchestrator.execute(run.clone()).await.unwrap();

        assert_eq!(run.state(), RunState::Done);
        assert_eq!(result.summary.successful, 1);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.notification, NotifyOutcome::Skipped);
        assert!(run.output_dir().is_dir());
    }

    #[tokio::test]
    async fn test_run_cannot_execute_twice() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(dir.path());
        let run = run(dir.path(), None);

        orchestrator.execute(run.clone()).await.unwrap();
        let err = orchestrator.execute(run).await.unwrap_err();

        assert!(matches!(err, ReconError::State(_)));
    }

    #[tokio::test]
    async fn test_notifies_only_with_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let orchestrator = orchestrator(dir.path()).with_notifier(notifier.clone());

        orchestrator.execute(run(dir.path(), None)).await.unwrap();
        orchestrator.execute(run(dir.path(), Some(" "))).await.unwrap();
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

        let result = orchestrator
            .execute(run(dir.path(), Some("https://hooks.example/abc")))
            .await
            .unwrap();
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.notification, NotifyOutcome::Delivered);
    }

    #[test]
    fn test_recon_orchestrator() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(ScannerConfig::from_home(dir.path())).unwrap();

        assert_eq!(orchestrator.pipeline().stage_count(), 12);
        assert_eq!(orchestrator.environment().registry().len(), 10);
    }
}

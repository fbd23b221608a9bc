//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::context::StageContext;
use crate::core::ExecutionOutcome;
use crate::stages::Stage;

/// A stage that always succeeds.
#[derive(Debug)]
pub struct SuccessStage {
    name: String,
    calls: AtomicUsize,
}

impl SuccessStage {
    /// Creates a new success stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the stage ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for SuccessStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ExecutionOutcome::succeeded(&self.name, &self.name, Duration::ZERO)
    }
}

/// A stage that always fails, as if its tool exited with status 1.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _ctx: &StageContext) -> ExecutionOutcome {
        ExecutionOutcome::failed(&self.name, &self.name, Duration::ZERO, &self.error).with_exit_code(1)
    }
}

/// A stage that takes time to execute. Cancellation interrupts the wait
/// and fails the stage, like a killed process.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self::new(name, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> ExecutionOutcome {
        let start = Instant::now();
        tokio::select! {
            () = tokio::time::sleep(self.delay) => {
                ExecutionOutcome::succeeded(&self.name, &self.name, start.elapsed())
            }
            () = ctx.cancellation().cancelled() => {
                ExecutionOutcome::failed(&self.name, &self.name, start.elapsed(), "cancelled")
            }
        }
    }
}

/// A stage that writes a file into the output directory, optionally after
/// a delay and in several chunks.
#[derive(Debug)]
pub struct FileWritingStage {
    name: String,
    file: String,
    lines: Vec<String>,
    reads: Vec<String>,
    delay: Duration,
}

impl FileWritingStage {
    /// Creates a stage that writes `lines` to `file`.
    #[must_use]
    pub fn new(name: impl Into<String>, file: impl Into<String>, lines: &[&str]) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            lines: lines.iter().map(|l| (*l).to_string()).collect(),
            reads: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    /// Declares an input file.
    #[must_use]
    pub fn reading(mut self, file: impl Into<String>) -> Self {
        self.reads.push(file.into());
        self
    }

    /// Sleeps this long between lines.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Stage for FileWritingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }

    fn writes(&self) -> Vec<String> {
        vec![self.file.clone()]
    }

    async fn execute(&self, ctx: &StageContext) -> ExecutionOutcome {
        use tokio::io::AsyncWriteExt;

        let start = Instant::now();
        let path = ctx.output_file(&self.file);
        let mut file = match tokio::fs::File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                return ExecutionOutcome::failed(&self.name, &self.name, start.elapsed(), e.to_string());
            }
        };

        for line in &self.lines {
            tokio::time::sleep(self.delay).await;
            if let Err(e) = file.write_all(format!("{line}\n").as_bytes()).await {
                return ExecutionOutcome::failed(&self.name, &self.name, start.elapsed(), e.to_string());
            }
            if let Err(e) = file.flush().await {
                return ExecutionOutcome::failed(&self.name, &self.name, start.elapsed(), e.to_string());
            }
        }

        ExecutionOutcome::succeeded(&self.name, &self.name, start.elapsed())
    }
}

/// What a [`RecordingStage`] saw when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExecution {
    /// The stage name from the context.
    pub stage: String,
    /// Contents of each declared input file, `None` if it was missing.
    pub inputs: Vec<(String, Option<String>)>,
    /// Whether the run was already cancelled.
    pub cancelled: bool,
}

/// A stage that records the input files it observes.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    reads: Vec<String>,
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reads: Vec::new(),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Declares an input file to capture.
    #[must_use]
    pub fn reading(mut self, file: impl Into<String>) -> Self {
        self.reads.push(file.into());
        self
    }

    /// Returns recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns how many times the stage ran.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }

    /// Contents of `file` as seen by the most recent execution.
    #[must_use]
    pub fn observed(&self, file: &str) -> Option<String> {
        self.executions
            .lock()
            .last()
            .and_then(|exec| exec.inputs.iter().find(|(name, _)| name == file))
            .and_then(|(_, content)| content.clone())
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn reads(&self) -> Vec<String> {
        self.reads.clone()
    }

    async fn execute(&self, ctx: &StageContext) -> ExecutionOutcome {
        let mut inputs = Vec::with_capacity(self.reads.len());
        for file in &self.reads {
            let content = tokio::fs::read_to_string(ctx.output_file(file)).await.ok();
            inputs.push((file.clone(), content));
        }

        self.executions.lock().push(RecordedExecution {
            stage: ctx.stage_name().to_string(),
            inputs,
            cancelled: ctx.is_cancelled(),
        });

        ExecutionOutcome::succeeded(&self.name, &self.name, Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PipelineContext;
    use crate::core::ExecutionMode;
    use crate::run::{Run, Target};
    use crate::runner::StageRunner;
    use std::path::Path;
    use std::sync::Arc;

    fn context(root: &Path, stage: &str) -> StageContext {
        let run = Arc::new(Run::new(
            Target::parse(Some("example.com")).unwrap(),
            root,
            ExecutionMode::Sequential,
        ));
        std::fs::create_dir_all(run.output_dir()).unwrap();
        StageContext::new(Arc::new(PipelineContext::new(run, Arc::new(StageRunner::new()))), stage, None)
    }

    #[tokio::test]
    async fn test_success_and_failing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "s");

        let ok = SuccessStage::new("s");
        assert!(ok.execute(&ctx).await.is_success());
        assert_eq!(ok.call_count(), 1);

        let outcome = FailingStage::new("f", "boom").execute(&ctx).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[tokio::test]
    async fn test_slow_stage_observes_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "slow");
        let stage = SlowStage::with_delay_ms("slow", 10_000);

        ctx.cancellation().cancel("interrupt");
        let outcome = stage.execute(&ctx).await;

        assert!(outcome.is_failure());
    }

    #[tokio::test]
    async fn test_file_writer_and_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "writer");

        let writer = FileWritingStage::new("writer", "subs.txt", &["a.example.com", "b.example.com"]);
        assert_eq!(writer.writes(), vec!["subs.txt"]);
        assert!(writer.execute(&ctx).await.is_success());

        let recorder = RecordingStage::new("reader").reading("subs.txt").reading("none.txt");
        recorder.execute(&ctx).await;

        assert_eq!(recorder.observed("subs.txt").as_deref(), Some("a.example.com\nb.example.com\n"));
        assert_eq!(recorder.observed("none.txt"), None);
        assert_eq!(recorder.execution_count(), 1);
    }
}

//! End-of-run summary.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

use crate::core::{ExecutionOutcome, StageStatus};
use crate::run::Run;

/// Aggregated result of a run, rendered for the operator and sent to the
/// notification endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// The run id.
    pub run_id: Uuid,
    /// The target domain.
    pub target: String,
    /// When the run started.
    pub started_at: DateTime<Local>,
    /// Elapsed wall-clock time, rounded to whole seconds.
    pub duration_secs: u64,
    /// The same duration rendered like `1m5s`.
    pub duration: String,
    /// Succeeded stages.
    pub successful: usize,
    /// Failed stages.
    pub failed: usize,
    /// Stages skipped because the run was interrupted.
    pub skipped: usize,
    /// The run output directory.
    pub output_dir: PathBuf,
    /// Per-stage outcomes in completion order.
    pub stages: Vec<ExecutionOutcome>,
}

impl RunSummary {
    /// Snapshots a run, measuring elapsed time from its start until now.
    #[must_use]
    pub fn from_run(run: &Run) -> Self {
        Self::with_elapsed(run, run.elapsed())
    }

    /// Snapshots a run with an explicit elapsed time.
    #[must_use]
    pub fn with_elapsed(run: &Run, elapsed: Duration) -> Self {
        let stages = run.outcomes();
        let duration_secs = round_secs(elapsed);

        Self {
            run_id: run.id(),
            target: run.target().to_string(),
            started_at: run.started_at(),
            duration_secs,
            duration: format_duration(duration_secs),
            successful: run.success_count(),
            failed: run.failure_count(),
            skipped: stages.iter().filter(|o| o.status == StageStatus::Skipped).count(),
            output_dir: run.output_dir().to_path_buf(),
            stages,
        }
    }

    /// Whether some stages never ran because of an interrupt.
    #[must_use]
    pub const fn interrupted(&self) -> bool {
        self.skipped > 0
    }

    /// Renders the operator-facing summary block.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "📊 Scan Summary for {}", self.target);
        let _ = writeln!(out, "---------------------------------");
        let _ = writeln!(out, "⏱  Duration:       {}", self.duration);
        let _ = writeln!(out, "✅ Successful:     {}", self.successful);
        let _ = writeln!(out, "❌ Failed:         {}", self.failed);
        if self.interrupted() {
            let _ = writeln!(out, "⚠  Skipped:        {} (interrupted)", self.skipped);
        }

        if !self.stages.is_empty() {
            let _ = writeln!(out);
            for stage in &self.stages {
                let _ = writeln!(out, "   {}", stage_line(stage));
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "📂 Output Directory: {}", self.output_dir.display());
        out
    }

    /// One line suitable for chat webhooks.
    #[must_use]
    pub fn headline(&self) -> String {
        format!(
            "Scan of {} finished in {}: {} successful, {} failed. Output: {}",
            self.target,
            self.duration,
            self.successful,
            self.failed,
            self.output_dir.display()
        )
    }

    /// The JSON body posted to the notification endpoint.
    ///
    /// `content` and `text` carry the same line so Discord and Slack style
    /// webhooks both display it.
    #[must_use]
    pub fn notification_payload(&self) -> serde_json::Value {
        let headline = self.headline();
        serde_json::json!({
            "target": &self.target,
            "duration_secs": self.duration_secs,
            "duration": &self.duration,
            "successful": self.successful,
            "failed": self.failed,
            "output_dir": self.output_dir.display().to_string(),
            "content": &headline,
            "text": headline,
        })
    }
}

fn stage_line(outcome: &ExecutionOutcome) -> String {
    let duration = format_duration(round_secs(outcome.duration));
    match outcome.status {
        StageStatus::Succeeded => format!("✔ {} ({}) {duration}", outcome.stage, outcome.tool),
        StageStatus::Failed => format!(
            "✖ {} ({}) {duration}: {}",
            outcome.stage,
            outcome.tool,
            outcome.error.as_deref().unwrap_or("failed")
        ),
        StageStatus::Skipped => {
            format!("- {} ({}) skipped", outcome.stage, outcome.tool)
        }
    }
}

/// Rounds to the nearest whole second, halves rounding up.
fn round_secs(elapsed: Duration) -> u64 {
    let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    millis.saturating_add(500) / 1000
}

/// Formats whole seconds like `45s`, `1m5s` or `2h0m3s`.
#[must_use]
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

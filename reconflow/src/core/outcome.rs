//! Per-stage execution outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::StageStatus;

/// The result of running one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// The stage name.
    pub stage: String,
    /// The external tool the stage invoked.
    pub tool: String,
    /// Terminal status.
    pub status: StageStatus,
    /// Process exit code, when the process exited normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock time spent in the stage.
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Why the stage failed or was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// A stage whose process exited with status zero.
    #[must_use]
    pub fn succeeded(stage: impl Into<String>, tool: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage: stage.into(),
            tool: tool.into(),
            status: StageStatus::Succeeded,
            exit_code: Some(0),
            duration,
            error: None,
        }
    }

    /// A stage that failed for the given reason.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        tool: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            tool: tool.into(),
            status: StageStatus::Failed,
            exit_code: None,
            duration,
            error: Some(error.into()),
        }
    }

    /// A stage that never started.
    #[must_use]
    pub fn skipped(stage: impl Into<String>, tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            tool: tool.into(),
            status: StageStatus::Skipped,
            exit_code: None,
            duration: Duration::ZERO,
            error: Some(reason.into()),
        }
    }

    /// Sets the process exit code.
    #[must_use]
    pub const fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Succeeded
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status == StageStatus::Failed
    }

    /// Duration in milliseconds, for structured logs and events.
    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome() {
        let outcome = ExecutionOutcome::failed("alive", "httpx", Duration::from_secs(2), "exit status 1")
            .with_exit_code(1);

        assert!(outcome.is_failure());
        assert!(!outcome.is_success());
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.error.as_deref(), Some("exit status 1"));
    }

    #[test]
    fn test_skipped_outcome_has_no_duration() {
        let outcome = ExecutionOutcome::skipped("nuclei", "nuclei", "run cancelled");
        assert_eq!(outcome.status, StageStatus::Skipped);
        assert_eq!(outcome.duration, Duration::ZERO);
    }

    #[test]
    fn test_outcome_serializes_duration_as_millis() {
        let outcome = ExecutionOutcome::succeeded("subdomains", "subfinder", Duration::from_millis(1500));
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["duration"], 1500);
        assert_eq!(json["status"], "succeeded");
        assert!(json.get("error").is_none());
    }
}

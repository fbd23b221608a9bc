//! Stage status, run lifecycle and execution mode enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a stage.
///
/// A stage is pending until it emits `stage.started` and executing until its
/// outcome is recorded; only the final status is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage's process exited with status zero.
    Succeeded,
    /// Stage's process failed to start, exited non-zero, timed out or was killed.
    Failed,
    /// Stage never started because the run was cancelled.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Lifecycle of a single run. A run is single-use and only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Directories and tools are being prepared.
    #[default]
    Initializing,
    /// Stages are executing.
    Running,
    /// The summary is being rendered and dispatched.
    Summarizing,
    /// Nothing left to do.
    Done,
}

impl RunState {
    /// Returns the only state this one may advance to.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Initializing => Some(Self::Running),
            Self::Running => Some(Self::Summarizing),
            Self::Summarizing => Some(Self::Done),
            Self::Done => None,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Summarizing => write!(f, "summarizing"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// How the pipeline dispatches its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One stage at a time, in declared order.
    #[default]
    Sequential,
    /// Stages of the same dependency wave run concurrently.
    Parallel,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(StageStatus::Failed.to_string(), "failed");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_run_state_only_moves_forward() {
        assert_eq!(RunState::Initializing.next(), Some(RunState::Running));
        assert_eq!(RunState::Running.next(), Some(RunState::Summarizing));
        assert_eq!(RunState::Summarizing.next(), Some(RunState::Done));
        assert_eq!(RunState::Done.next(), None);
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let deserialized: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, StageStatus::Succeeded);
    }

    #[test]
    fn test_execution_mode_default() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::Parallel.to_string(), "parallel");
    }
}

//! Error types for the reconflow engine.
//!
//! Only input errors abort a run. Bootstrap, stage and notification failures
//! are folded into the run's counters or logged, so most of these types
//! surface while a pipeline is being built or configured.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::RunState;

/// The main error type for reconflow operations.
#[derive(Debug, Error)]
pub enum ReconError {
    /// The pipeline graph is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A cycle was detected in the pipeline.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// The operator supplied an unusable target.
    #[error("{0}")]
    Input(#[from] InputError),

    /// A run lifecycle transition was rejected.
    #[error("{0}")]
    State(#[from] StateError),

    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A working directory could not be prepared.
    #[error("Failed to prepare directory {}: {source}", path.display())]
    Directory {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONTRACT-004-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Errors in the operator-supplied target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// No domain argument was given.
    #[error("Please provide a domain")]
    MissingDomain,

    /// The domain is not a usable hostname.
    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain {
        /// The rejected input.
        domain: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A rejected run lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid run transition: {from} -> {to}")]
pub struct StateError {
    /// The current state.
    pub from: RunState,
    /// The requested state.
    pub to: RunState,
}

/// Errors loading scanner configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors delivering a completion notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint was empty.
    #[error("Notification endpoint is empty")]
    EmptyEndpoint,

    /// The HTTP request failed or returned an error status.
    #[error("Webhook delivery failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "alive".to_string(),
            "urls".to_string(),
            "alive".to_string(),
        ]);

        assert!(err.to_string().contains("alive -> urls -> alive"));
        assert_eq!(err.error_info.code, "CONTRACT-004-CYCLE");

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.code(), Some("CONTRACT-004-CYCLE"));
        assert_eq!(validation.stages.len(), 3);
    }

    #[test]
    fn test_input_error_messages() {
        assert_eq!(InputError::MissingDomain.to_string(), "Please provide a domain");

        let err = InputError::InvalidDomain {
            domain: "a b".to_string(),
            reason: "contains whitespace".to_string(),
        };
        assert!(err.to_string().contains("'a b'"));
    }

    #[test]
    fn test_state_error_display() {
        let err = StateError {
            from: RunState::Done,
            to: RunState::Running,
        };
        assert_eq!(err.to_string(), "Invalid run transition: done -> running");
    }
}

//! A single scan run: target, output location, counters and lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDate};
use parking_lot::Mutex;
use regex::Regex;
use uuid::Uuid;

use crate::core::{ExecutionMode, ExecutionOutcome, RunState, StageStatus};
use crate::errors::{InputError, StateError};

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)*[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
        .unwrap_or_else(|e| unreachable!("hostname pattern is valid: {e}"))
});

/// A validated target domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// Validates the operator-supplied domain argument.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::MissingDomain`] for an absent or blank argument
    /// and [`InputError::InvalidDomain`] for anything that is not a hostname.
    pub fn parse(raw: Option<&str>) -> Result<Self, InputError> {
        let domain = raw.map(str::trim).filter(|d| !d.is_empty()).ok_or(InputError::MissingDomain)?;
        let domain = domain.trim_end_matches('.');

        if domain.len() > 253 {
            return Err(InputError::InvalidDomain {
                domain: domain.to_string(),
                reason: "longer than 253 characters".to_string(),
            });
        }
        if !HOSTNAME.is_match(domain) {
            return Err(InputError::InvalidDomain {
                domain: domain.to_string(),
                reason: "expected a hostname such as example.com".to_string(),
            });
        }

        Ok(Self(domain.to_ascii_lowercase()))
    }

    /// The domain string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the per-run output directory: `<domain>_<YYYY-MM-DD>`.
#[must_use]
pub fn output_dir_name(target: &Target, date: NaiveDate) -> String {
    format!("{}_{}", target, date.format("%Y-%m-%d"))
}

/// One invocation of the pipeline for a single target.
///
/// Counters are atomics so parallel stage workers can fold their outcomes
/// without coordination.
#[derive(Debug)]
pub struct Run {
    id: Uuid,
    target: Target,
    output_dir: PathBuf,
    started_at: DateTime<Local>,
    started: Instant,
    webhook: Option<String>,
    mode: ExecutionMode,
    state: Mutex<RunState>,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    outcomes: Mutex<Vec<ExecutionOutcome>>,
}

impl Run {
    /// Creates a run whose output directory is dated today.
    #[must_use]
    pub fn new(target: Target, output_root: &Path, mode: ExecutionMode) -> Self {
        let started_at = Local::now();
        let output_dir = output_root.join(output_dir_name(&target, started_at.date_naive()));

        Self {
            id: Uuid::new_v4(),
            target,
            output_dir,
            started_at,
            started: Instant::now(),
            webhook: None,
            mode,
            state: Mutex::new(RunState::Initializing),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            outcomes: Mutex::new(Vec::new()),
        }
    }

    /// Sets the notification endpoint. Blank endpoints count as none.
    #[must_use]
    pub fn with_webhook(mut self, endpoint: Option<String>) -> Self {
        self.webhook = endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        self
    }

    /// The run id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The target domain.
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// The directory all stage files live in.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of a named file inside the output directory.
    #[must_use]
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Wall-clock start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The notification endpoint, if any.
    #[must_use]
    pub fn webhook(&self) -> Option<&str> {
        self.webhook.as_deref()
    }

    /// The execution mode.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    /// Moves the run to `to`, which must be the next state.
    ///
    /// # Errors
    ///
    /// Returns a [`StateError`] for any other transition.
    pub fn advance(&self, to: RunState) -> Result<(), StateError> {
        let mut state = self.state.lock();
        if state.next() == Some(to) {
            *state = to;
            Ok(())
        } else {
            Err(StateError { from: *state, to })
        }
    }

    /// Folds a stage outcome into the counters and the audit trail.
    pub fn record(&self, outcome: ExecutionOutcome) {
        match outcome.status {
            StageStatus::Succeeded => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
            }
            StageStatus::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            StageStatus::Skipped => {}
        }
        self.outcomes.lock().push(outcome);
    }

    /// Number of succeeded stages.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Number of failed stages.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Every recorded outcome, in completion order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<ExecutionOutcome> {
        self.outcomes.lock().clone()
    }
}

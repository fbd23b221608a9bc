//! Subprocess execution for stages and tool installs.
//!
//! One call launches exactly one process and waits for it. Output goes
//! straight to the operator's terminal unless the command redirects stdout
//! into a file. Every failure mode (spawn error, non-zero exit, signal,
//! timeout, cancellation) becomes a failed [`ExecutionOutcome`]; nothing here
//! returns an error to the pipeline.
//!
//! On Unix each process leads its own process group, and a timeout or
//! cancellation kills the whole group so that commands started by `sh -c`
//! go down with it.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::core::ExecutionOutcome;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to run.
    pub program: String,
    /// Its arguments.
    pub args: Vec<String>,
    /// File connected to stdin. Without one, stdin is null.
    pub stdin: Option<PathBuf>,
    /// File stdout is written to. Without one, stdout is inherited.
    pub stdout: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
            env: Vec::new(),
        }
    }

    /// Runs `script` through `sh -c`.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Reads stdin from a file.
    #[must_use]
    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Writes stdout to a file.
    #[must_use]
    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// The command line as the operator would type it.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

enum SpawnError {
    Redirect(String),
    Spawn(io::Error),
}

enum Waited {
    Exited(io::Result<ExitStatus>),
    TimedOut(Duration),
    Cancelled,
}

/// Launches stage processes with a shared search path and default timeout.
#[derive(Debug, Clone, Default)]
pub struct StageRunner {
    search_path: Option<OsString>,
    default_timeout: Option<Duration>,
}

impl StageRunner {
    /// Creates a runner that inherits the process `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `PATH` handed to every spawned process.
    #[must_use]
    pub fn with_search_path(mut self, search_path: OsString) -> Self {
        self.search_path = Some(search_path);
        self
    }

    /// Sets the timeout applied when a stage does not set its own.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The configured default timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Runs `command` to completion and classifies the result.
    ///
    /// `timeout` overrides the runner default. When it expires, or when
    /// `cancel` fires, the child is killed and reaped before returning.
    pub async fn execute(
        &self,
        stage: &str,
        tool: &str,
        command: &CommandSpec,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return ExecutionOutcome::skipped(stage, tool, "run cancelled before start");
        }

        debug!(stage, tool, command = %command.display(), "Spawning process");

        let mut child = match self.spawn(command) {
            Ok(child) => child,
            Err(SpawnError::Redirect(reason)) => {
                warn!(stage, tool, error = %reason, "Stage file redirection failed");
                return ExecutionOutcome::failed(stage, tool, start.elapsed(), reason);
            }
            Err(SpawnError::Spawn(e)) => {
                let reason = if e.kind() == io::ErrorKind::NotFound {
                    format!("{tool} not found: {e}")
                } else {
                    format!("failed to start {}: {e}", command.program)
                };
                warn!(stage, tool, error = %reason, "Process could not be started");
                return ExecutionOutcome::failed(stage, tool, start.elapsed(), reason);
            }
        };

        let timeout = timeout.or(self.default_timeout);
        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            limit = deadline(timeout) => Waited::TimedOut(limit),
            () = cancel.cancelled() => Waited::Cancelled,
        };

        match waited {
            Waited::Exited(Ok(status)) => classify(stage, tool, status, start.elapsed()),
            Waited::Exited(Err(e)) => {
                ExecutionOutcome::failed(stage, tool, start.elapsed(), format!("wait failed: {e}"))
            }
            Waited::TimedOut(limit) => {
                terminate(&mut child, stage).await;
                warn!(stage, tool, timeout_secs = limit.as_secs(), "Stage timed out");
                ExecutionOutcome::failed(
                    stage,
                    tool,
                    start.elapsed(),
                    format!("timed out after {}s", limit.as_secs()),
                )
            }
            Waited::Cancelled => {
                terminate(&mut child, stage).await;
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                ExecutionOutcome::failed(stage, tool, start.elapsed(), format!("cancelled: {reason}"))
            }
        }
    }

    fn spawn(&self, spec: &CommandSpec) -> Result<Child, SpawnError> {
        let mut command = Command::new(&spec.program);
        command.args(&spec.args).stderr(Stdio::inherit()).kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        if let Some(ref path) = self.search_path {
            command.env("PATH", path);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        command.stdin(match spec.stdin {
            Some(ref path) => Stdio::from(File::open(path).map_err(|e| {
                SpawnError::Redirect(format!("cannot read {}: {e}", path.display()))
            })?),
            None => Stdio::null(),
        });
        command.stdout(match spec.stdout {
            Some(ref path) => Stdio::from(File::create(path).map_err(|e| {
                SpawnError::Redirect(format!("cannot write {}: {e}", path.display()))
            })?),
            None => Stdio::inherit(),
        });

        command.spawn().map_err(SpawnError::Spawn)
    }
}

async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

async fn terminate(child: &mut Child, stage: &str) {
    #[cfg(unix)]
    if let Some(pgid) = child.id() {
        kill_process_group(pgid, stage).await;
    }
    if let Err(e) = child.kill().await {
        warn!(stage, error = %e, "Failed to kill process");
    }
}

#[cfg(unix)]
async fn kill_process_group(pgid: u32, stage: &str) {
    let result = Command::new("kill")
        .args(["-KILL", "--", &format!("-{pgid}")])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => debug!(stage, pgid, "Killed process group"),
        Ok(status) => debug!(stage, pgid, %status, "Process group kill reported failure"),
        Err(e) => warn!(stage, pgid, error = %e, "Could not signal process group"),
    }
}

fn classify(stage: &str, tool: &str, status: ExitStatus, elapsed: Duration) -> ExecutionOutcome {
    match status.code() {
        Some(0) => ExecutionOutcome::succeeded(stage, tool, elapsed),
        Some(code) => {
            ExecutionOutcome::failed(stage, tool, elapsed, format!("exit status {code}")).with_exit_code(code)
        }
        None => ExecutionOutcome::failed(stage, tool, elapsed, format!("terminated by signal ({status})")),
    }
}

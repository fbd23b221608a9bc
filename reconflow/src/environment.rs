//! Working directories and tool bootstrap.
//!
//! The lookup path handed to every subprocess is computed once here. The
//! process environment is never modified.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::ScannerConfig;
use crate::errors::ReconError;
use crate::events::{EventSink, NoOpEventSink};
use crate::run::Run;
use crate::runner::{CommandSpec, StageRunner};
use crate::tools::{extend_search_path, find_executable, ToolRegistry, ToolSpec};

/// What bootstrap did for each tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    /// Tools found without installing.
    pub present: Vec<String>,
    /// Tools installed during this run.
    pub installed: Vec<String>,
    /// Tools whose install command failed or did not produce the binary.
    pub failed: Vec<String>,
    /// Tools absent while installation was disabled.
    pub missing: Vec<String>,
    /// Tools whose post-install setup failed.
    pub setup_failed: Vec<String>,
}

impl PrepareReport {
    /// Returns true if every tool is available.
    #[must_use]
    pub fn all_available(&self) -> bool {
        self.failed.is_empty() && self.missing.is_empty()
    }
}

/// Resolved directories, lookup path and tool inventory for a scanner.
pub struct Environment {
    config: ScannerConfig,
    registry: ToolRegistry,
    search_path: OsString,
    event_sink: Arc<dyn EventSink>,
}

impl Environment {
    /// Creates an environment whose lookup path starts with the tool cache
    /// and the Go and pip install directories, followed by the inherited
    /// `PATH`.
    #[must_use]
    pub fn new(config: ScannerConfig, registry: ToolRegistry) -> Self {
        let gopath = std::env::var_os("GOPATH").filter(|v| !v.is_empty());
        let prepend = tool_dirs(&config, dirs::home_dir().as_deref(), gopath.as_deref());
        let inherited = std::env::var_os("PATH");
        let search_path = extend_search_path(&prepend, inherited.as_deref()).unwrap_or_else(|e| {
            warn!(error = %e, "Tool directories cannot be joined into PATH, using inherited PATH");
            inherited.clone().unwrap_or_default()
        });

        Self {
            config,
            registry,
            search_path,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink for install events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Replaces the lookup path.
    #[must_use]
    pub fn with_search_path(mut self, search_path: OsString) -> Self {
        self.search_path = search_path;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Returns the tool registry.
    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Returns the lookup path handed to subprocesses.
    #[must_use]
    pub fn search_path(&self) -> &OsString {
        &self.search_path
    }

    /// Finds an executable on the lookup path.
    #[must_use]
    pub fn locate(&self, binary: &str) -> Option<PathBuf> {
        find_executable(binary, &self.search_path)
    }

    /// A runner that spawns processes with this environment's lookup path
    /// and the configured default timeout.
    #[must_use]
    pub fn runner(&self) -> StageRunner {
        StageRunner::new()
            .with_search_path(self.search_path.clone())
            .with_default_timeout(self.config.stage_timeout())
    }

    /// Creates the tool cache, its `bin/` directory and the run output
    /// directory. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`ReconError::Directory`] if a directory cannot be created.
    pub fn ensure_dirs(&self, run: &Run) -> Result<(), ReconError> {
        create_dir(&self.config.tools_dir)?;
        create_dir(&self.config.tools_bin_dir())?;
        create_dir(run.output_dir())
    }

    /// Prepares directories and installs missing tools.
    ///
    /// Install and setup failures are logged and reported, never returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if a directory cannot be created.
    pub async fn prepare(&self, run: &Run, cancel: &CancellationToken) -> Result<PrepareReport, ReconError> {
        self.ensure_dirs(run)?;

        let mut report = PrepareReport::default();
        let runner = StageRunner::new().with_search_path(self.search_path.clone());
        let mut available = Vec::new();

        for tool in self.registry.iter() {
            if let Some(path) = self.locate(&tool.binary) {
                debug!(tool = %tool.name, path = %path.display(), "Tool present");
                report.present.push(tool.name.clone());
                available.push(tool);
            } else if !self.config.install_missing {
                warn!(tool = %tool.name, "Tool missing and installation disabled");
                report.missing.push(tool.name.clone());
            } else if self.install(tool, &runner, cancel).await {
                report.installed.push(tool.name.clone());
                available.push(tool);
            } else {
                report.failed.push(tool.name.clone());
            }
        }

        for tool in available {
            if let Some(setup) = tool.setup_command(&self.config.tools_dir) {
                let command = self.shell(setup);
                let outcome = runner
                    .execute(&format!("setup:{}", tool.name), &tool.name, &command, None, cancel)
                    .await;
                if !outcome.is_success() {
                    warn!(tool = %tool.name, error = outcome.error.as_deref().unwrap_or_default(), "Tool setup failed");
                    report.setup_failed.push(tool.name.clone());
                }
            }
        }

        info!(
            present = report.present.len(),
            installed = report.installed.len(),
            failed = report.failed.len(),
            missing = report.missing.len(),
            "Tool bootstrap finished"
        );
        Ok(report)
    }

    async fn install(&self, tool: &ToolSpec, runner: &StageRunner, cancel: &CancellationToken) -> bool {
        let install = tool.install_command(&self.config.tools_dir);
        info!(tool = %tool.name, command = %install, "Installing tool");
        self.event_sink.emit(
            "tool.install.started",
            Some(serde_json::json!({ "tool": &tool.name, "command": &install })),
        );

        let outcome = runner
            .execute(&format!("install:{}", tool.name), &tool.name, &self.shell(install), None, cancel)
            .await;

        let error = if !outcome.is_success() {
            outcome.error.clone()
        } else if self.locate(&tool.binary).is_none() {
            Some(format!("{} not found after install", tool.binary))
        } else {
            None
        };

        match error {
            None => {
                self.event_sink.emit(
                    "tool.install.completed",
                    Some(serde_json::json!({ "tool": &tool.name, "duration_ms": outcome.duration_ms() })),
                );
                true
            }
            Some(error) => {
                warn!(tool = %tool.name, %error, "Tool install failed");
                self.event_sink.emit(
                    "tool.install.failed",
                    Some(serde_json::json!({ "tool": &tool.name, "error": error })),
                );
                false
            }
        }
    }

    fn shell(&self, script: String) -> CommandSpec {
        CommandSpec::shell(script).env("GOBIN", self.config.tools_bin_dir().display().to_string())
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("tools_dir", &self.config.tools_dir)
            .field("output_root", &self.config.output_root)
            .field("tools", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn create_dir(path: &Path) -> Result<(), ReconError> {
    std::fs::create_dir_all(path).map_err(|source| ReconError::Directory {
        path: path.to_path_buf(),
        source,
    })
}

/// Directories installers drop binaries into, in lookup order: the tool
/// cache, `$GOPATH/bin`, `~/go/bin` and the pip user directory `~/.local/bin`.
fn tool_dirs(config: &ScannerConfig, home: Option<&Path>, gopath: Option<&OsStr>) -> Vec<PathBuf> {
    let mut found = vec![config.tools_bin_dir(), config.tools_dir.clone()];
    if let Some(gopath) = gopath {
        found.push(Path::new(gopath).join("bin"));
    }
    if let Some(home) = home {
        found.push(home.join("go").join("bin"));
        found.push(home.join(".local").join("bin"));
    }
    found.dedup();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionMode;
    use crate::events::CollectingEventSink;
    use crate::run::Target;
    use pretty_assertions::assert_eq;

    fn setup(root: &Path, registry: ToolRegistry) -> (Environment, Run) {
        let config = ScannerConfig::from_home(root);
        let run = Run::new(
            Target::parse(Some("example.com")).unwrap(),
            &config.output_root,
            ExecutionMode::Sequential,
        );
        (Environment::new(config, registry), run)
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (env, run) = setup(dir.path(), ToolRegistry::new());

        env.ensure_dirs(&run).unwrap();
        std::fs::write(run.output_file("subs.txt"), "a.example.com\n").unwrap();
        env.ensure_dirs(&run).unwrap();

        assert!(env.config().tools_bin_dir().is_dir());
        assert!(run.output_dir().is_dir());
        assert_eq!(
            std::fs::read_to_string(run.output_file("subs.txt")).unwrap(),
            "a.example.com\n"
        );
    }

    #[test]
    fn test_ensure_dirs_reports_blocked_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join(".bounty_tools");
        std::fs::write(&blocker, "not a directory").unwrap();
        let (env, run) = setup(dir.path(), ToolRegistry::new());

        let err = env.ensure_dirs(&run).unwrap_err();
        assert!(matches!(err, ReconError::Directory { .. }));
    }

    #[test]
    fn test_search_path_prefers_tool_cache() {
        let dir = tempfile::tempdir().unwrap();
        let (env, _run) = setup(dir.path(), ToolRegistry::new());

        let first: Vec<_> = std::env::split_paths(env.search_path()).take(2).collect();
        assert_eq!(first, vec![env.config().tools_bin_dir(), env.config().tools_dir.clone()]);
    }

    #[test]
    fn test_tool_dirs_include_go_and_pip_locations() {
        let config = ScannerConfig::from_home(Path::new("/home/op"));

        let found = tool_dirs(&config, Some(Path::new("/home/op")), Some(OsStr::new("/opt/go")));

        assert_eq!(
            found,
            vec![
                PathBuf::from("/home/op/.bounty_tools/bin"),
                PathBuf::from("/home/op/.bounty_tools"),
                PathBuf::from("/opt/go/bin"),
                PathBuf::from("/home/op/go/bin"),
                PathBuf::from("/home/op/.local/bin"),
            ]
        );
    }

    #[test]
    fn test_tool_dirs_without_home_or_gopath() {
        let config = ScannerConfig::from_home(Path::new("/home/op"));
        assert_eq!(tool_dirs(&config, None, None).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_pip_user_install_is_locatable() {
        use std::os::unix::fs::PermissionsExt;

        let home = tempfile::tempdir().unwrap();
        let local_bin = home.path().join(".local").join("bin");
        std::fs::create_dir_all(&local_bin).unwrap();
        let tool = local_bin.join("dirsearch");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ScannerConfig::from_home(home.path());
        let prepend = tool_dirs(&config, Some(home.path()), None);
        let search_path = extend_search_path(&prepend, Some(OsStr::new("/usr/bin:/bin"))).unwrap();
        let env = Environment::new(config, ToolRegistry::new()).with_search_path(search_path);

        assert_eq!(env.locate("dirsearch"), Some(tool));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prepare_installs_missing_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::new()
            .with_tool(ToolSpec::new("shell", "exit 1").with_binary("sh"))
            .with_tool(ToolSpec::new(
                "fake",
                "printf '#!/bin/sh\\nexit 0\\n' > \"$GOBIN/fake\" && chmod +x \"$GOBIN/fake\"",
            ))
            .with_tool(ToolSpec::new("broken", "exit 3"))
            .with_tool(ToolSpec::new("lazy", "true"));
        let sink = Arc::new(CollectingEventSink::new());
        let (env, run) = setup(dir.path(), registry);
        let env = env.with_event_sink(sink.clone());

        let report = env.prepare(&run, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.present, vec!["shell"]);
        assert_eq!(report.installed, vec!["fake"]);
        assert_eq!(report.failed, vec!["broken", "lazy"]);
        assert!(env.locate("fake").is_some());
        assert_eq!(sink.events_of_type("tool.install.failed").len(), 2);
        assert_eq!(sink.events_of_type("tool.install.completed").len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prepare_skips_install_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("installed");
        let registry = ToolRegistry::new().with_tool(ToolSpec::new(
            "ghost-tool",
            format!("touch {}", marker.display()),
        ));
        let config = ScannerConfig::from_home(dir.path()).without_install();
        let run = Run::new(
            Target::parse(Some("example.com")).unwrap(),
            &config.output_root,
            ExecutionMode::Sequential,
        );
        let env = Environment::new(config, registry);

        let report = env.prepare(&run, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.missing, vec!["ghost-tool"]);
        assert!(!report.all_available());
        assert!(!marker.exists());
        assert!(run.output_dir().is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_setup_runs_for_available_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::new()
            .with_tool(
                ToolSpec::new("shell", "exit 1")
                    .with_binary("sh")
                    .with_setup("touch {tools_dir}/setup-done"),
            )
            .with_tool(ToolSpec::new("bad-setup", "exit 1").with_binary("sh").with_setup("exit 4"));
        let (env, run) = setup(dir.path(), registry);

        let report = env.prepare(&run, &CancellationToken::new()).await.unwrap();

        assert!(env.config().tools_dir.join("setup-done").exists());
        assert_eq!(report.setup_failed, vec!["bad-setup"]);
    }
}

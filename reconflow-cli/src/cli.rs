//! Command-line arguments and their mapping onto the scanner config.

use std::path::PathBuf;

use clap::Parser;
use reconflow::config::ScannerConfig;
use reconflow::core::ExecutionMode;
use reconflow::errors::{ConfigError, InputError};
use reconflow::run::Target;

/// Reconnaissance pipeline for bug bounty targets
#[derive(Debug, Parser)]
#[command(name = "scanner", version, about, long_about = None)]
pub struct Cli {
    /// Target domain to scan (e.g. example.com)
    pub domain: Option<String>,

    /// Webhook URL notified with the run summary
    #[arg(long)]
    pub webhook: Option<String>,

    /// Run independent stages concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Maximum number of concurrently running stages (with --parallel)
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Per-stage timeout in seconds (0 disables)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Directory tools are installed into (default: ~/.bounty_tools)
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Directory run output is written under (default: ~/bounty_output)
    #[arg(long)]
    pub output_root: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not install missing tools
    #[arg(long)]
    pub skip_install: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validates the domain argument.
    pub fn target(&self) -> Result<Target, InputError> {
        Target::parse(self.domain.as_deref())
    }

    pub const fn mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    /// Whether progress is printed as colored lines. With `--json` it goes
    /// to the log instead.
    pub const fn console_progress(&self) -> bool {
        !self.json
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub const fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    /// Loads the config file if given, then applies flag overrides.
    pub fn scanner_config(&self) -> Result<ScannerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ScannerConfig::load(path)?,
            None => ScannerConfig::default(),
        };

        if let Some(dir) = &self.tools_dir {
            config = config.with_tools_dir(dir);
        }
        if let Some(dir) = &self.output_root {
            config = config.with_output_root(dir);
        }
        if let Some(secs) = self.timeout {
            config = config.with_stage_timeout_secs(secs);
        }
        if let Some(max) = self.max_parallel {
            config = config.with_max_parallel(max);
        }
        if self.skip_install {
            config = config.without_install();
        }
        Ok(config)
    }
}

//! # Reconflow
//!
//! Dependency-aware orchestration of external reconnaissance tools.
//!
//! Given a target domain, reconflow runs a catalog of opaque scanning tools
//! (subfinder, httpx, katana, nuclei, ...) and accounts for each one's
//! success or failure:
//!
//! - **Bootstrap**: missing tools are installed into a private cache before
//!   the run, and the cache is put on the lookup path of every subprocess
//! - **Stage graph**: stages declare the files they read and write, and the
//!   builder derives the dependency DAG from those declarations
//! - **Sequential or wave-parallel execution**: independent stages can run
//!   concurrently without ever racing on a shared file
//! - **Fail-open accounting**: a failing tool is counted and the run goes on
//! - **Summary and notification**: the result is rendered for the operator
//!   and optionally posted to a webhook
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reconflow::prelude::*;
//!
//! let config = ScannerConfig::default();
//! let run = Arc::new(Run::new(Target::parse(Some("example.com"))?, &config.output_root, ExecutionMode::Parallel));
//! let result = Orchestrator::new(config)?.execute(run).await?;
//! println!("{}", result.summary.render());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod environment;
pub mod errors;
pub mod events;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod recon;
pub mod run;
pub mod runner;
pub mod stages;
pub mod summary;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ScannerConfig, ToolOverride};
    pub use crate::context::{PipelineContext, StageContext};
    pub use crate::core::{ExecutionMode, ExecutionOutcome, RunState, StageStatus};
    pub use crate::environment::{Environment, PrepareReport};
    pub use crate::errors::{
        ConfigError, ContractErrorInfo, CycleDetectedError, InputError, NotifyError,
        PipelineValidationError, ReconError, StateError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::notify::{Notifier, NotifyOutcome, WebhookNotifier};
    pub use crate::orchestrator::{Orchestrator, RunResult};
    pub use crate::pipeline::{PipelineBuilder, RunReport, StageGraph, StageSpec};
    pub use crate::recon::{recon_pipeline, recon_registry, recon_tools};
    pub use crate::run::{Run, Target};
    pub use crate::runner::{CommandSpec, StageRunner};
    pub use crate::stages::{Stage, ToolStage};
    pub use crate::summary::RunSummary;
    pub use crate::tools::{ToolRegistry, ToolSpec};
    pub use std::sync::Arc;
}

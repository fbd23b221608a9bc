//! Stage trait and implementations.
//!
//! A stage is one unit of scan work, usually a single external tool
//! invocation. Stages declare the files they read and write inside the run
//! output directory; the pipeline builder derives ordering from those
//! declarations.

mod command;

pub use command::{Arg, ToolStage};

use crate::context::StageContext;
use crate::core::ExecutionOutcome;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns the tool the stage runs. Defaults to the stage name.
    fn tool(&self) -> &str {
        self.name()
    }

    /// Files in the output directory this stage consumes.
    fn reads(&self) -> Vec<String> {
        Vec::new()
    }

    /// Files in the output directory this stage produces.
    fn writes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Executes the stage.
    ///
    /// Stages never return errors: every failure is reported through the
    /// returned outcome so the pipeline can keep going.
    async fn execute(&self, ctx: &StageContext) -> ExecutionOutcome;
}

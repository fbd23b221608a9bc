//! Context management for pipeline execution.

mod execution;

pub use execution::{PipelineContext, StageContext};

//! Pipeline building and execution.
//!
//! This module provides:
//! - Stage specifications
//! - A pipeline builder that derives dependencies from file hazards
//! - The DAG execution engine (sequential and wave-parallel)

mod builder;
mod dag;
mod spec;

pub use builder::PipelineBuilder;
pub use dag::{RunReport, StageGraph};
pub use spec::StageSpec;

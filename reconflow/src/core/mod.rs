//! Core domain model types for reconflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Stage status, run lifecycle and execution mode enums
//! - The per-stage execution outcome

mod outcome;
mod status;

pub use outcome::ExecutionOutcome;
pub use status::{ExecutionMode, RunState, StageStatus};

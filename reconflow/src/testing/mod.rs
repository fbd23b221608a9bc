//! Testing utilities for reconflow pipelines.
//!
//! Mock stages stand in for external tools so pipelines can be exercised
//! without spawning processes.

mod mocks;

pub use mocks::{
    FailingStage, FileWritingStage, RecordedExecution, RecordingStage, SlowStage, SuccessStage,
};

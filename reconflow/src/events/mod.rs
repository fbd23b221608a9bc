//! Event sink system for observability.
//!
//! The pipeline reports stage lifecycle through an explicitly passed
//! [`EventSink`]. Event types:
//!
//! - `pipeline.started` / `pipeline.completed`
//! - `wave.started` (parallel mode only)
//! - `stage.started` / `stage.completed` / `stage.failed` / `stage.skipped`
//! - `tool.install.started` / `tool.install.completed` / `tool.install.failed`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

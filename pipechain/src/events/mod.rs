//! Event sink system for observability.
//!
//! The executor reports run lifecycle events here:
//! - `pipeline.started`
//! - `pipeline.completed`
//! - `pipeline.failed`

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a run is seeded.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Event emitted when end-of-pipe reaches the caller.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Event emitted when a run aborts.
pub const PIPELINE_FAILED: &str = "pipeline.failed";

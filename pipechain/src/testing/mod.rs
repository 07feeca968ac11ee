//! Testing utilities for pipelines.
//!
//! This module provides:
//! - Mock processors and a shared call log
//! - Response handlers that fail on demand
//! - Assertions over run results and summaries

mod assertions;
mod fixtures;
mod handlers;
mod mocks;

pub use assertions::{assert_balanced, assert_error_code, assert_starved, assert_steps};
pub use fixtures::{forwarding_chain, sample_metadata};
pub use handlers::FailingHandler;
pub use mocks::{
    CallLog, CallRecord, FailingProcessor, OverreachingProcessor, RecordingProcessor,
    SilentProcessor, TerminalProcessor,
};

//! Pipeline definition and execution.
//!
//! This module provides:
//! - The pipeline definition and its builder
//! - The serial executor and its ready queue
//! - Response handlers and run summaries

mod builder;
mod definition;
mod executor;
mod handler;
mod integration_tests;
mod ready_queue;
mod summary;

pub use builder::PipelineBuilder;
pub use definition::Pipeline;
pub use executor::{PipelineExecutor, SerialPipelineExecutor};
pub use handler::{CollectingHandler, ResponseHandler};
pub use ready_queue::{ReadyQueue, ReadySlot};
pub use summary::RunSummary;

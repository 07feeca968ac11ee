//! # Pipechain
//!
//! Serial execution of request/response processor chains.
//!
//! A pipeline is an ordered list of processors. A single request enters
//! stage 0 and travels towards the last stage; responses travel back and
//! leave stage 0 to the caller. The run ends when stage 0 sends
//! end-of-pipe. The serial executor gives you:
//!
//! - **Deterministic scheduling**: one callback at a time, lowest stage first
//! - **Per-stage contexts**: private typed data kept across one run
//! - **Fail-fast runs**: every error aborts the run with a single [`errors::PipelineError`]
//! - **Lifecycle events**: started, completed and failed runs reported to an [`events::EventSink`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipechain::prelude::*;
//!
//! let pipeline = Pipeline::builder("render")
//!     .map(MapInfo::new("city", "City map"))
//!     .processor(PassThroughProcessor::new("cache"))
//!     .processor(TileRenderer::new())
//!     .build()?;
//!
//! let (tiles, summary) = SerialPipelineExecutor::new()
//!     .collect(&pipeline, GetMapRequest::new(bbox))
//!     .await?;
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

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod processors;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ExecutorConfig, LogFormat, LoggingConfig};
    pub use crate::context::{DataKey, StageContext, StageData};
    pub use crate::core::{
        LayerInfo, MapInfo, Message, MessageKind, PipelineMetadata, ProcessorResponse, RunState,
        ServiceInfo,
    };
    pub use crate::errors::{PipelineError, PipelineValidationError, SendError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        CollectingHandler, Pipeline, PipelineBuilder, PipelineExecutor, ResponseHandler,
        RunSummary, SerialPipelineExecutor,
    };
    pub use crate::processors::{FnProcessor, PassThroughProcessor, Processor};
}

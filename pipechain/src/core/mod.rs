//! Core domain model types.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Messages routed between stages and the end-of-pipe sentinel
//! - Map, layer and service metadata shared by a pipeline
//! - Run lifecycle states

mod message;
mod metadata;
mod state;

pub use message::{Message, MessageKind, ProcessorResponse};
pub use metadata::{LayerInfo, MapInfo, PipelineMetadata, ServiceInfo};
pub use state::RunState;

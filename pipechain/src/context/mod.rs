//! Per-stage execution contexts.
//!
//! This module provides:
//! - The stage context through which a processor sends messages
//! - Typed, processor-private data storage

mod data;
mod stage;

pub use data::{DataKey, StageData};
pub(crate) use stage::{CallerQueue, Outgoing};
pub use stage::StageContext;

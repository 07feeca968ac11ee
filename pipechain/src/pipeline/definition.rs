//! The pipeline definition: an ordered processor chain plus metadata.

use super::PipelineBuilder;
use crate::core::{Message, PipelineMetadata};
use crate::processors::Processor;
use std::fmt;
use std::sync::Arc;

/// A fixed, ordered chain of processors.
///
/// Stage `i` sends requests to stage `i + 1` and responses to stage
/// `i - 1`. A pipeline is immutable once built and can be shared by any
/// number of concurrent runs.
pub struct Pipeline<Req: Message, Resp: Message> {
    name: String,
    processors: Vec<Arc<dyn Processor<Req, Resp>>>,
    metadata: Arc<PipelineMetadata>,
}

impl<Req: Message, Resp: Message> Pipeline<Req, Resp> {
    /// Starts building a pipeline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> PipelineBuilder<Req, Resp> {
        PipelineBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        processors: Vec<Arc<dyn Processor<Req, Resp>>>,
        metadata: PipelineMetadata,
    ) -> Self {
        Self {
            name,
            processors,
            metadata: Arc::new(metadata),
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if the pipeline has no stages. Built pipelines never do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Returns the processors in stage order.
    #[must_use]
    pub fn processors(&self) -> &[Arc<dyn Processor<Req, Resp>>] {
        &self.processors
    }

    /// Returns the processor at a stage.
    #[must_use]
    pub fn processor(&self, index: usize) -> Option<&Arc<dyn Processor<Req, Resp>>> {
        self.processors.get(index)
    }

    /// Returns the processor names in stage order.
    #[must_use]
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Returns the pipeline metadata.
    #[must_use]
    pub fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }

    pub(crate) fn shared_metadata(&self) -> Arc<PipelineMetadata> {
        Arc::clone(&self.metadata)
    }
}

impl<Req: Message, Resp: Message> Clone for Pipeline<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            processors: self.processors.clone(),
            metadata: Arc::clone(&self.metadata),
        }
    }
}

impl<Req: Message, Resp: Message> fmt::Debug for Pipeline<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("processors", &self.processor_names())
            .field("map", &self.metadata.map.id)
            .finish()
    }
}

//! Pipeline builder with validation.

use super::Pipeline;
use crate::core::{LayerInfo, MapInfo, Message, PipelineMetadata, ServiceInfo};
use crate::errors::PipelineValidationError;
use crate::processors::Processor;
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated pipelines.
pub struct PipelineBuilder<Req: Message, Resp: Message> {
    /// The pipeline name.
    name: String,
    /// The processors in stage order.
    processors: Vec<Arc<dyn Processor<Req, Resp>>>,
    /// Metadata shared by all stages.
    metadata: PipelineMetadata,
}

impl<Req: Message, Resp: Message> PipelineBuilder<Req, Resp> {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            processors: Vec::new(),
            metadata: PipelineMetadata::default(),
        }
    }

    /// Appends a processor as the next stage.
    #[must_use]
    pub fn processor<P>(mut self, processor: P) -> Self
    where
        P: Processor<Req, Resp> + 'static,
    {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Appends an already shared processor as the next stage.
    #[must_use]
    pub fn shared_processor(mut self, processor: Arc<dyn Processor<Req, Resp>>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Replaces the whole metadata block.
    #[must_use]
    pub fn metadata(mut self, metadata: PipelineMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the owning map.
    #[must_use]
    pub fn map(mut self, map: MapInfo) -> Self {
        self.metadata.map = map;
        self
    }

    /// Adds a layer.
    #[must_use]
    pub fn layer(mut self, layer: LayerInfo) -> Self {
        self.metadata.layers.push(layer);
        self
    }

    /// Sets the associated service.
    #[must_use]
    pub fn service(mut self, service: ServiceInfo) -> Self {
        self.metadata.service = Some(service);
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.processors.len()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank or no processor was added.
    pub fn build(self) -> Result<Pipeline<Req, Resp>, PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Pipeline name cannot be empty or whitespace-only",
            ));
        }

        if self.processors.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no processors",
                self.name
            ))
            .with_fix_hint("Add at least one processor to the pipeline before building."));
        }

        Ok(Pipeline::from_parts(self.name, self.processors, self.metadata))
    }
}

impl<Req: Message, Resp: Message> fmt::Debug for PipelineBuilder<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.processors.len())
            .finish()
    }
}

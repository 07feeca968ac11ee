//! The per-stage context a processor works through.

use super::{DataKey, StageData};
use crate::core::{LayerInfo, MapInfo, PipelineMetadata, ProcessorResponse, ServiceInfo};
use crate::errors::SendError;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// A message sent by a processor during one callback, routed by the
/// executor once the callback returns.
pub(crate) enum Outgoing<Req, Resp> {
    Request(Req),
    Response(ProcessorResponse<Resp>),
}

/// Responses sent from stage 0 during a callback, drained by the executor
/// whenever the callback yields or returns.
pub(crate) type CallerQueue<Resp> = Arc<Mutex<VecDeque<Resp>>>;

/// Mutable state of one pipeline position for one run.
///
/// Holds the stage's pending request and response queues, its typed data
/// store and its end-of-pipe flag. A processor only ever sees the context
/// of its own position.
pub struct StageContext<Req, Resp> {
    index: usize,
    stage_count: usize,
    processor_name: String,
    run_id: Uuid,
    metadata: Arc<PipelineMetadata>,
    data: StageData,
    requests: VecDeque<Req>,
    responses: VecDeque<ProcessorResponse<Resp>>,
    outbox: Vec<Outgoing<Req, Resp>>,
    caller: Option<CallerQueue<Resp>>,
    eop: bool,
    boundary_violation: bool,
}

impl<Req, Resp> StageContext<Req, Resp> {
    /// Creates a fresh context for the stage at `index`.
    #[must_use]
    pub fn new(
        index: usize,
        stage_count: usize,
        processor_name: impl Into<String>,
        run_id: Uuid,
        metadata: Arc<PipelineMetadata>,
    ) -> Self {
        Self {
            index,
            stage_count,
            processor_name: processor_name.into(),
            run_id,
            metadata,
            data: StageData::new(),
            requests: VecDeque::new(),
            responses: VecDeque::new(),
            outbox: Vec::new(),
            caller: None,
            eop: false,
            boundary_violation: false,
        }
    }

    /// Position of this stage in the pipeline.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Number of stages in the pipeline.
    #[must_use]
    pub const fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Returns true for stage 0, whose responses go to the caller.
    #[must_use]
    pub const fn is_first(&self) -> bool {
        self.index == 0
    }

    /// Returns true for the terminal stage, which has no downstream.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.index + 1 == self.stage_count
    }

    /// Name of the processor owning this stage.
    #[must_use]
    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    /// Identifier of the current run.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns true once this stage has sent end-of-pipe upstream.
    #[must_use]
    pub const fn is_eop(&self) -> bool {
        self.eop
    }

    /// Number of requests waiting for this stage.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of responses waiting for this stage.
    #[must_use]
    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }

    /// Pipeline-level metadata.
    #[must_use]
    pub fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }

    /// The owning map.
    #[must_use]
    pub fn map(&self) -> &MapInfo {
        &self.metadata.map
    }

    /// The layers the pipeline serves.
    #[must_use]
    pub fn layers(&self) -> &[LayerInfo] {
        &self.metadata.layers
    }

    /// The associated service.
    #[must_use]
    pub fn service(&self) -> Option<&ServiceInfo> {
        self.metadata.service.as_ref()
    }

    /// Stores processor data for later callbacks, returning the previous value.
    pub fn put<T: Any + Send>(&mut self, key: DataKey<T>, value: T) -> Option<T> {
        self.data.put(key, value)
    }

    /// Reads processor data stored by an earlier callback.
    #[must_use]
    pub fn get<T: Any + Send>(&self, key: DataKey<T>) -> Option<&T> {
        self.data.get(key)
    }

    /// Mutable access to processor data.
    pub fn get_mut<T: Any + Send>(&mut self, key: DataKey<T>) -> Option<&mut T> {
        self.data.get_mut(key)
    }

    /// Removes processor data.
    pub fn remove<T: Any + Send>(&mut self, key: DataKey<T>) -> Option<T> {
        self.data.remove(key)
    }

    /// Checks for processor data.
    #[must_use]
    pub fn contains<T: Any + Send>(&self, key: DataKey<T>) -> bool {
        self.data.contains(key)
    }

    /// The whole data store of this stage.
    pub fn data_mut(&mut self) -> &mut StageData {
        &mut self.data
    }

    /// Sends a request to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NoDownstream`] from the terminal stage. The
    /// violation is recorded and fails the run even if the error is ignored.
    pub fn send_request(&mut self, request: Req) -> Result<(), SendError> {
        if self.is_last() {
            self.boundary_violation = true;
            return Err(SendError::NoDownstream { stage: self.index });
        }
        self.outbox.push(Outgoing::Request(request));
        Ok(())
    }

    /// Sends a response to the previous stage, or to the caller from stage 0.
    ///
    /// At stage 0 of a running pipeline a non-terminal response is handed to
    /// the response handler as soon as the current callback yields or
    /// returns, even if the callback later fails.
    pub fn send_response(&mut self, response: ProcessorResponse<Resp>) {
        if self.eop {
            warn!(
                stage = self.index,
                processor = %self.processor_name,
                eop = response.is_eop(),
                "Response sent after end-of-pipe"
            );
        }
        match (response, &self.caller) {
            (ProcessorResponse::Item(item), Some(caller)) if self.index == 0 => {
                caller.lock().push_back(item);
            }
            (response, _) => {
                if response.is_eop() {
                    self.eop = true;
                }
                self.outbox.push(Outgoing::Response(response));
            }
        }
    }

    /// Sends a regular response payload.
    pub fn send_item(&mut self, item: Resp) {
        self.send_response(ProcessorResponse::Item(item));
    }

    /// Sends end-of-pipe upstream.
    pub fn send_eop(&mut self) {
        self.send_response(ProcessorResponse::Eop);
    }

    pub(crate) fn enqueue_request(&mut self, request: Req) {
        self.requests.push_back(request);
    }

    pub(crate) fn enqueue_response(&mut self, response: ProcessorResponse<Resp>) {
        self.responses.push_back(response);
    }

    pub(crate) fn pop_request(&mut self) -> Option<Req> {
        self.requests.pop_front()
    }

    pub(crate) fn pop_response(&mut self) -> Option<ProcessorResponse<Resp>> {
        self.responses.pop_front()
    }

    pub(crate) fn attach_caller(&mut self, caller: CallerQueue<Resp>) {
        self.caller = Some(caller);
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Outgoing<Req, Resp>> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn take_boundary_violation(&mut self) -> bool {
        std::mem::replace(&mut self.boundary_violation, false)
    }
}

impl<Req, Resp> fmt::Debug for StageContext<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("index", &self.index)
            .field("stage_count", &self.stage_count)
            .field("processor", &self.processor_name)
            .field("pending_requests", &self.requests.len())
            .field("pending_responses", &self.responses.len())
            .field("eop", &self.eop)
            .field("data", &self.data)
            .finish()
    }
}

//! Mock processors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::StageContext;
use crate::core::{Message, MessageKind, ProcessorResponse};
use crate::processors::Processor;

/// Answers every request with the configured responses followed by
/// end-of-pipe. Meant for the last stage.
#[derive(Debug, Clone)]
pub struct TerminalProcessor<Resp> {
    name: String,
    responses: Vec<Resp>,
}

impl<Resp> TerminalProcessor<Resp> {
    /// Creates a terminal processor that only sends end-of-pipe.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Vec::new(),
        }
    }

    /// Sets the responses sent ahead of end-of-pipe.
    #[must_use]
    pub fn with_responses(mut self, responses: Vec<Resp>) -> Self {
        self.responses = responses;
        self
    }
}

#[async_trait]
impl<Req, Resp> Processor<Req, Resp> for TerminalProcessor<Resp>
where
    Req: Message,
    Resp: Message + Clone + Sync + Debug,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        _request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        for response in &self.responses {
            ctx.send_item(response.clone());
        }
        ctx.send_eop();
        Ok(())
    }
}

/// Consumes every message without forwarding anything.
#[derive(Debug, Clone)]
pub struct SilentProcessor {
    name: String,
}

impl SilentProcessor {
    /// Creates a new silent processor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<Req: Message, Resp: Message> Processor<Req, Resp> for SilentProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        _request: Req,
        _ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn handle_response(
        &self,
        _response: ProcessorResponse<Resp>,
        _ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Fails while handling one kind of message.
///
/// When failing on responses, requests are forwarded downstream so that a
/// response eventually comes back.
#[derive(Debug, Clone)]
pub struct FailingProcessor {
    name: String,
    fail_on: MessageKind,
    message: String,
}

impl FailingProcessor {
    /// Creates a processor that fails on its first request.
    #[must_use]
    pub fn on_request(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_on: MessageKind::Request,
            message: message.into(),
        }
    }

    /// Creates a processor that forwards requests and fails on its first response.
    #[must_use]
    pub fn on_response(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fail_on: MessageKind::Response,
            message: message.into(),
        }
    }
}

#[async_trait]
impl<Req: Message, Resp: Message> Processor<Req, Resp> for FailingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        match self.fail_on {
            MessageKind::Request => anyhow::bail!("{}", self.message),
            MessageKind::Response => {
                ctx.send_request(request)?;
                Ok(())
            }
        }
    }

    async fn handle_response(
        &self,
        _response: ProcessorResponse<Resp>,
        _ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.message)
    }
}

/// Tries to forward requests past the end of the pipeline, ignores the
/// error and then sends end-of-pipe.
#[derive(Debug, Clone)]
pub struct OverreachingProcessor {
    name: String,
}

impl OverreachingProcessor {
    /// Creates a new overreaching processor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<Req: Message, Resp: Message> Processor<Req, Resp> for OverreachingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        let _ignored = ctx.send_request(request);
        ctx.send_eop();
        Ok(())
    }
}

/// One recorded processor callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Name of the called processor.
    pub processor: String,
    /// Stage index of the call.
    pub stage: usize,
    /// Kind of message delivered.
    pub kind: MessageKind,
    /// Whether the delivered response was end-of-pipe.
    pub eop: bool,
    /// Run the call belonged to.
    pub run_id: Uuid,
}

/// Shared, ordered log of processor callbacks.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    records: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all records in call order.
    #[must_use]
    pub fn records(&self) -> Vec<CallRecord> {
        self.records.lock().clone()
    }

    /// Returns `(stage, kind)` of every call in order.
    #[must_use]
    pub fn trace(&self) -> Vec<(usize, MessageKind)> {
        self.records.lock().iter().map(|r| (r.stage, r.kind)).collect()
    }

    /// Returns the number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, record: CallRecord) {
        self.records.lock().push(record);
    }
}

/// Wraps a processor and records every callback into a [`CallLog`].
#[derive(Debug)]
pub struct RecordingProcessor<P> {
    inner: P,
    log: CallLog,
}

impl<P> RecordingProcessor<P> {
    /// Wraps `inner`, recording into `log`.
    #[must_use]
    pub const fn new(inner: P, log: CallLog) -> Self {
        Self { inner, log }
    }
}

#[async_trait]
impl<Req, Resp, P> Processor<Req, Resp> for RecordingProcessor<P>
where
    Req: Message,
    Resp: Message,
    P: Processor<Req, Resp>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        self.log.push(CallRecord {
            processor: self.inner.name().to_string(),
            stage: ctx.index(),
            kind: MessageKind::Request,
            eop: false,
            run_id: ctx.run_id(),
        });
        self.inner.handle_request(request, ctx).await
    }

    async fn handle_response(
        &self,
        response: ProcessorResponse<Resp>,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        self.log.push(CallRecord {
            processor: self.inner.name().to_string(),
            stage: ctx.index(),
            kind: MessageKind::Response,
            eop: response.is_eop(),
            run_id: ctx.run_id(),
        });
        self.inner.handle_response(response, ctx).await
    }
}

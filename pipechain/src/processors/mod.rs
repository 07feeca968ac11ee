//! Processor trait and implementations.
//!
//! Processors are the stages of a pipeline. Each one receives requests
//! from upstream and responses from downstream through its own
//! [`StageContext`].

use crate::context::StageContext;
use crate::core::{Message, ProcessorResponse};
use async_trait::async_trait;
use std::fmt::{self, Debug};

/// Trait for pipeline processors.
///
/// A processor may send any number of requests and responses from either
/// callback, but every callback must eventually lead to something being
/// forwarded or to end-of-pipe being sent upstream. A processor that
/// swallows a message stalls the pipeline and fails the run.
///
/// Callbacks take `&self`. State that spans several callbacks of one run
/// belongs in the stage context data.
#[async_trait]
pub trait Processor<Req, Resp>: Send + Sync + Debug
where
    Req: Message,
    Resp: Message,
{
    /// Returns the name of the processor.
    fn name(&self) -> &str;

    /// Handles a request arriving from the previous stage (or the caller).
    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()>;

    /// Handles a response arriving from the next stage.
    ///
    /// The default forwards the response upstream unchanged.
    async fn handle_response(
        &self,
        response: ProcessorResponse<Resp>,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        ctx.send_response(response);
        Ok(())
    }
}

type RequestFn<Req, Resp> =
    Box<dyn Fn(Req, &mut StageContext<Req, Resp>) -> anyhow::Result<()> + Send + Sync>;
type ResponseFn<Req, Resp> = Box<
    dyn Fn(ProcessorResponse<Resp>, &mut StageContext<Req, Resp>) -> anyhow::Result<()>
        + Send
        + Sync,
>;

/// A closure-based processor.
pub struct FnProcessor<Req, Resp> {
    name: String,
    on_request: RequestFn<Req, Resp>,
    on_response: Option<ResponseFn<Req, Resp>>,
}

impl<Req, Resp> FnProcessor<Req, Resp> {
    /// Creates a processor from a request closure. Responses are forwarded
    /// upstream unless [`FnProcessor::on_response`] is set.
    pub fn new<F>(name: impl Into<String>, on_request: F) -> Self
    where
        F: Fn(Req, &mut StageContext<Req, Resp>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            on_request: Box::new(on_request),
            on_response: None,
        }
    }

    /// Sets the response closure.
    #[must_use]
    pub fn on_response<G>(mut self, on_response: G) -> Self
    where
        G: Fn(ProcessorResponse<Resp>, &mut StageContext<Req, Resp>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.on_response = Some(Box::new(on_response));
        self
    }
}

impl<Req, Resp> Debug for FnProcessor<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProcessor")
            .field("name", &self.name)
            .field("custom_response", &self.on_response.is_some())
            .finish()
    }
}

#[async_trait]
impl<Req, Resp> Processor<Req, Resp> for FnProcessor<Req, Resp>
where
    Req: Message,
    Resp: Message,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        (self.on_request)(request, ctx)
    }

    async fn handle_response(
        &self,
        response: ProcessorResponse<Resp>,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        match &self.on_response {
            Some(on_response) => on_response(response, ctx),
            None => {
                ctx.send_response(response);
                Ok(())
            }
        }
    }
}

/// A processor that forwards requests downstream and responses upstream
/// unchanged.
#[derive(Debug, Clone)]
pub struct PassThroughProcessor {
    name: String,
}

impl PassThroughProcessor {
    /// Creates a new pass-through processor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<Req, Resp> Processor<Req, Resp> for PassThroughProcessor
where
    Req: Message,
    Resp: Message,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_request(
        &self,
        request: Req,
        ctx: &mut StageContext<Req, Resp>,
    ) -> anyhow::Result<()> {
        ctx.send_request(request)?;
        Ok(())
    }
}

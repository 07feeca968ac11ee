//! Serial pipeline execution inside the calling task.
//!
//! One run drives a single initial request through the processor chain.
//! Exactly one processor callback is in flight at any time; messages it
//! sends are routed to the neighbouring stages once it returns.

use super::{CollectingHandler, Pipeline, ReadyQueue, ReadySlot, ResponseHandler, RunSummary};
use crate::config::ExecutorConfig;
use crate::context::{CallerQueue, Outgoing, StageContext};
use crate::core::{Message, MessageKind, ProcessorResponse, RunState};
use crate::errors::PipelineError;
use crate::events::{
    EventSink, NoOpEventSink, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_STARTED,
};
use crate::observability::{RunSpanAttributes, SpanTimer};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Trait for types that execute pipelines.
#[async_trait]
pub trait PipelineExecutor<Req: Message, Resp: Message>: Send + Sync {
    /// Runs `request` through `pipeline`, handing every non-terminal
    /// response that leaves stage 0 to `handler`.
    async fn execute(
        &self,
        pipeline: &Pipeline<Req, Resp>,
        request: Req,
        handler: &mut dyn ResponseHandler<Resp>,
    ) -> Result<RunSummary, PipelineError>;
}

/// Executes the processors of a pipeline one at a time, in the calling task.
///
/// Each step picks the lowest stage with a pending message and delivers
/// one message to it, a request before a response. The run ends when
/// end-of-pipe is sent from stage 0 and fails as soon as no stage has
/// pending work, a processor or the handler errors, or the terminal stage
/// tries to send downstream.
#[derive(Clone)]
pub struct SerialPipelineExecutor {
    config: ExecutorConfig,
    event_sink: Arc<dyn EventSink>,
}

impl SerialPipelineExecutor {
    /// Creates an executor with default configuration and no event sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::default(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Runs `request` through `pipeline`.
    ///
    /// Every non-terminal response sent from stage 0 goes to `handler` in
    /// arrival order.
    ///
    /// # Errors
    ///
    /// Returns the single error that aborted the run.
    pub async fn execute<Req, Resp, H>(
        &self,
        pipeline: &Pipeline<Req, Resp>,
        request: Req,
        handler: &mut H,
    ) -> Result<RunSummary, PipelineError>
    where
        Req: Message,
        Resp: Message,
        H: ResponseHandler<Resp> + ?Sized,
    {
        let mut run = Run::seed(pipeline, request);

        let mut attrs = RunSpanAttributes::new()
            .with_pipeline_name(pipeline.name())
            .with_run_id(run.run_id.to_string())
            .with_stage_count(pipeline.len())
            .with_map_id(&pipeline.metadata().map.id);
        if let Some(service) = &pipeline.metadata().service {
            attrs = attrs.with_service_id(&service.id);
        }
        self.emit(PIPELINE_STARTED, attrs.to_event_data());

        let span = info_span!(
            "pipeline.run",
            run_id = %run.run_id,
            pipeline = %pipeline.name(),
            stages = pipeline.len()
        );

        match self.drive(&mut run, handler).instrument(span).await {
            Ok(()) => {
                let summary = run.summary();
                info!(
                    run_id = %summary.run_id,
                    pipeline = %summary.pipeline,
                    steps = summary.steps,
                    responses = summary.responses_delivered,
                    duration_ms = summary.duration_ms,
                    "Pipeline run completed"
                );
                self.emit(PIPELINE_COMPLETED, summary.to_event_data());
                Ok(summary)
            }
            Err(err) => {
                warn!(
                    run_id = %run.run_id,
                    pipeline = %pipeline.name(),
                    steps = run.steps,
                    code = err.error_code(),
                    error = %err,
                    "Pipeline run failed"
                );
                self.emit(
                    PIPELINE_FAILED,
                    serde_json::json!({
                        "run_id": run.run_id.to_string(),
                        "pipeline": pipeline.name(),
                        "steps": run.steps,
                        "code": err.error_code(),
                        "stage": err.stage(),
                        "error": err.to_string(),
                    }),
                );
                Err(err)
            }
        }
    }

    /// Runs `request` through `pipeline` and returns all responses at once.
    ///
    /// # Errors
    ///
    /// Returns the single error that aborted the run.
    pub async fn collect<Req, Resp>(
        &self,
        pipeline: &Pipeline<Req, Resp>,
        request: Req,
    ) -> Result<(Vec<Resp>, RunSummary), PipelineError>
    where
        Req: Message,
        Resp: Message,
    {
        let mut handler = CollectingHandler::new();
        let summary = self.execute(pipeline, request, &mut handler).await?;
        Ok((handler.into_responses(), summary))
    }

    async fn drive<Req, Resp, H>(
        &self,
        run: &mut Run<'_, Req, Resp>,
        handler: &mut H,
    ) -> Result<(), PipelineError>
    where
        Req: Message,
        Resp: Message,
        H: ResponseHandler<Resp> + ?Sized,
    {
        while !run.state.is_terminal() {
            if let Err(err) = self.advance(run, handler).await {
                run.transition(RunState::Failed);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Performs one state machine transition.
    async fn advance<Req, Resp, H>(
        &self,
        run: &mut Run<'_, Req, Resp>,
        handler: &mut H,
    ) -> Result<(), PipelineError>
    where
        Req: Message,
        Resp: Message,
        H: ResponseHandler<Resp> + ?Sized,
    {
        match run.state {
            RunState::Seeded => run.transition(RunState::Running),
            RunState::Running => {
                if run.eop_reached {
                    run.transition(RunState::Terminated);
                    return Ok(());
                }

                let slot = run.ready.next().ok_or_else(|| PipelineError::Starvation {
                    steps: run.steps,
                    stage_count: run.contexts.len(),
                })?;

                if let Some(limit) = self.config.max_steps {
                    if run.steps >= limit {
                        return Err(PipelineError::StepLimitExceeded { limit });
                    }
                }

                run.current = Some(slot);
                run.transition(RunState::Delivering);
            }
            RunState::Delivering => {
                if let Some((stage, kind)) = run.current.take() {
                    run.dispatch(stage, kind, handler).await?;
                    run.route(stage, handler)?;
                }
                run.transition(RunState::Running);
            }
            RunState::Terminated | RunState::Failed => {}
        }
        Ok(())
    }

    fn emit(&self, event_type: &str, data: serde_json::Value) {
        if self.config.emit_events {
            self.event_sink.try_emit(event_type, Some(data));
        }
    }
}

impl Default for SerialPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SerialPipelineExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialPipelineExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<Req: Message, Resp: Message> PipelineExecutor<Req, Resp> for SerialPipelineExecutor {
    async fn execute(
        &self,
        pipeline: &Pipeline<Req, Resp>,
        request: Req,
        handler: &mut dyn ResponseHandler<Resp>,
    ) -> Result<RunSummary, PipelineError> {
        Self::execute(self, pipeline, request, handler).await
    }
}

type Callback<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// State of one run: the stage contexts (indexed by position), the ready
/// queue over their message queues, and counters.
struct Run<'p, Req: Message, Resp: Message> {
    pipeline: &'p Pipeline<Req, Resp>,
    run_id: Uuid,
    contexts: Vec<StageContext<Req, Resp>>,
    ready: ReadyQueue,
    caller: CallerQueue<Resp>,
    state: RunState,
    current: Option<ReadySlot>,
    eop_reached: bool,
    steps: u64,
    requests_processed: u64,
    responses_processed: u64,
    responses_delivered: u64,
    started_at: DateTime<Utc>,
    timer: SpanTimer,
}

impl<'p, Req: Message, Resp: Message> Run<'p, Req, Resp> {
    fn seed(pipeline: &'p Pipeline<Req, Resp>, request: Req) -> Self {
        let run_id = Uuid::new_v4();
        let stage_count = pipeline.len();
        let metadata = pipeline.shared_metadata();

        let mut contexts: Vec<StageContext<Req, Resp>> = pipeline
            .processors()
            .iter()
            .enumerate()
            .map(|(index, processor)| {
                StageContext::new(
                    index,
                    stage_count,
                    processor.name(),
                    run_id,
                    Arc::clone(&metadata),
                )
            })
            .collect();

        let caller: CallerQueue<Resp> = Arc::new(Mutex::new(VecDeque::new()));
        let mut ready = ReadyQueue::new();
        if let Some(first) = contexts.first_mut() {
            first.attach_caller(Arc::clone(&caller));
            first.enqueue_request(request);
            ready.mark(0, MessageKind::Request);
        }

        Self {
            pipeline,
            run_id,
            contexts,
            ready,
            caller,
            state: RunState::Seeded,
            current: None,
            eop_reached: false,
            steps: 0,
            requests_processed: 0,
            responses_processed: 0,
            responses_delivered: 0,
            started_at: Utc::now(),
            timer: SpanTimer::start("pipeline.run"),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.state,
            next
        );
        trace!(from = %self.state, to = %next, "Run state transition");
        self.state = next;
    }

    /// Delivers the head message of one stage queue to its processor.
    ///
    /// Stage 0 responses reach `handler` while the callback runs: the caller
    /// queue is drained every time the callback is polled.
    async fn dispatch<H>(
        &mut self,
        stage: usize,
        kind: MessageKind,
        handler: &mut H,
    ) -> Result<(), PipelineError>
    where
        H: ResponseHandler<Resp> + ?Sized,
    {
        let pipeline = self.pipeline;
        let processor = &pipeline.processors()[stage];
        let ctx = &mut self.contexts[stage];

        let callback: Callback<'_> = match kind {
            MessageKind::Request => {
                let Some(request) = ctx.pop_request() else {
                    self.ready.clear(stage, kind);
                    return Ok(());
                };
                if ctx.pending_requests() == 0 {
                    self.ready.clear(stage, kind);
                }
                self.requests_processed += 1;
                debug!(
                    stage,
                    kind = %kind,
                    processor = processor.name(),
                    "Dispatching request"
                );
                processor.handle_request(request, ctx)
            }
            MessageKind::Response => {
                let Some(response) = ctx.pop_response() else {
                    self.ready.clear(stage, kind);
                    return Ok(());
                };
                if ctx.pending_responses() == 0 {
                    self.ready.clear(stage, kind);
                }
                self.responses_processed += 1;
                debug!(
                    stage,
                    kind = %kind,
                    processor = processor.name(),
                    eop = response.is_eop(),
                    "Dispatching response"
                );
                processor.handle_response(response, ctx)
            }
        };
        let result =
            deliver_while_running(callback, &self.caller, handler, &mut self.responses_delivered)
                .await?;
        self.steps += 1;

        if self.contexts[stage].take_boundary_violation() {
            return Err(PipelineError::BoundaryViolation {
                stage,
                processor: processor.name().to_string(),
            });
        }
        result.map_err(|source| PipelineError::processor(stage, processor.name(), kind, source))
    }

    /// Routes what the processor at `stage` sent during its last callback.
    fn route<H>(&mut self, stage: usize, handler: &mut H) -> Result<(), PipelineError>
    where
        H: ResponseHandler<Resp> + ?Sized,
    {
        let outgoing = self.contexts[stage].take_outbox();
        for message in outgoing {
            match message {
                Outgoing::Request(request) => {
                    let next = stage + 1;
                    self.contexts[next].enqueue_request(request);
                    self.ready.mark(next, MessageKind::Request);
                }
                Outgoing::Response(response) if stage > 0 => {
                    let previous = stage - 1;
                    self.contexts[previous].enqueue_response(response);
                    self.ready.mark(previous, MessageKind::Response);
                }
                Outgoing::Response(ProcessorResponse::Item(item)) => {
                    handler.handle(item).map_err(PipelineError::handler)?;
                    self.responses_delivered += 1;
                }
                Outgoing::Response(ProcessorResponse::Eop) => {
                    debug!(steps = self.steps, "End of pipe reached the caller");
                    self.eop_reached = true;
                }
            }
        }
        Ok(())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            pipeline: self.pipeline.name().to_string(),
            stage_count: self.contexts.len(),
            steps: self.steps,
            requests_processed: self.requests_processed,
            responses_processed: self.responses_processed,
            responses_delivered: self.responses_delivered,
            started_at: self.started_at,
            duration_ms: self.timer.elapsed_ms(),
        }
    }
}

/// Polls a processor callback to completion, handing every response queued
/// for the caller to `handler` after each poll.
///
/// The outer error is a handler failure, which drops the callback; the
/// inner result is the callback's own.
async fn deliver_while_running<Resp, H>(
    mut callback: Callback<'_>,
    caller: &CallerQueue<Resp>,
    handler: &mut H,
    delivered: &mut u64,
) -> Result<anyhow::Result<()>, PipelineError>
where
    Resp: Message,
    H: ResponseHandler<Resp> + ?Sized,
{
    poll_fn(|cx| {
        let polled = callback.as_mut().poll(cx);
        loop {
            let Some(item) = caller.lock().pop_front() else {
                break;
            };
            if let Err(source) = handler.handle(item) {
                caller.lock().clear();
                return Poll::Ready(Err(PipelineError::handler(source)));
            }
            *delivered += 1;
        }
        polled.map(Ok)
    })
    .await
}

//! The caller-side sink for responses leaving stage 0.

/// Receives every non-terminal response that reaches the caller, in
/// arrival order.
///
/// Any `FnMut(Resp) -> anyhow::Result<()>` closure is a handler.
pub trait ResponseHandler<Resp>: Send {
    /// Handles one response.
    ///
    /// # Errors
    ///
    /// Any error aborts the run with `PipelineError::Handler`.
    fn handle(&mut self, response: Resp) -> anyhow::Result<()>;
}

impl<Resp, F> ResponseHandler<Resp> for F
where
    F: FnMut(Resp) -> anyhow::Result<()> + Send,
{
    fn handle(&mut self, response: Resp) -> anyhow::Result<()> {
        self(response)
    }
}

/// A handler that keeps every response it receives.
#[derive(Debug, Clone)]
pub struct CollectingHandler<Resp> {
    responses: Vec<Resp>,
}

impl<Resp> CollectingHandler<Resp> {
    /// Creates an empty collecting handler.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            responses: Vec::new(),
        }
    }

    /// Returns the collected responses.
    #[must_use]
    pub fn responses(&self) -> &[Resp] {
        &self.responses
    }

    /// Returns the number of collected responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Consumes the handler, returning the collected responses.
    #[must_use]
    pub fn into_responses(self) -> Vec<Resp> {
        self.responses
    }
}

impl<Resp> Default for CollectingHandler<Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Resp: Send> ResponseHandler<Resp> for CollectingHandler<Resp> {
    fn handle(&mut self, response: Resp) -> anyhow::Result<()> {
        self.responses.push(response);
        Ok(())
    }
}

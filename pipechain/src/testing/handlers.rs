//! Response handlers for testing.

use crate::pipeline::ResponseHandler;

/// Accepts responses until the configured count is reached, then fails.
#[derive(Debug, Clone)]
pub struct FailingHandler<Resp> {
    accept: usize,
    received: Vec<Resp>,
    message: String,
}

impl<Resp> FailingHandler<Resp> {
    /// Creates a handler that accepts `accept` responses and fails on the next.
    #[must_use]
    pub fn after(accept: usize, message: impl Into<String>) -> Self {
        Self {
            accept,
            received: Vec::new(),
            message: message.into(),
        }
    }

    /// Returns the responses accepted before failing.
    #[must_use]
    pub fn received(&self) -> &[Resp] {
        &self.received
    }
}

impl<Resp: Send> ResponseHandler<Resp> for FailingHandler<Resp> {
    fn handle(&mut self, response: Resp) -> anyhow::Result<()> {
        if self.received.len() >= self.accept {
            anyhow::bail!("{}", self.message);
        }
        self.received.push(response);
        Ok(())
    }
}

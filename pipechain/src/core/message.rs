//! Messages routed between pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bound for request and response payload types.
///
/// Payloads move between stages and may cross threads together with the
/// run that carries them.
pub trait Message: Send + 'static {}

impl<T: Send + 'static> Message for T {}

/// A response flowing upstream through the pipeline.
///
/// `Eop` is the end-of-pipe sentinel: the sending stage and everything
/// below it will produce no further responses for this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorResponse<T> {
    /// A regular response payload.
    Item(T),
    /// End of pipe.
    Eop,
}

impl<T> ProcessorResponse<T> {
    /// Returns true if this is the end-of-pipe sentinel.
    #[must_use]
    pub const fn is_eop(&self) -> bool {
        matches!(self, Self::Eop)
    }

    /// Returns the payload, or `None` for `Eop`.
    #[must_use]
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Eop => None,
        }
    }

    /// Borrows the payload, or `None` for `Eop`.
    #[must_use]
    pub const fn as_item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Eop => None,
        }
    }

    /// Maps the payload, keeping `Eop` as is.
    pub fn map<U, F>(self, f: F) -> ProcessorResponse<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Item(item) => ProcessorResponse::Item(f(item)),
            Self::Eop => ProcessorResponse::Eop,
        }
    }
}

impl<T> From<T> for ProcessorResponse<T> {
    fn from(item: T) -> Self {
        Self::Item(item)
    }
}

/// The kind of message a stage is processing.
///
/// Requests order before responses, which is the tie-break used when a
/// single stage has both kinds pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A request travelling downstream.
    Request,
    /// A response travelling upstream.
    Response,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

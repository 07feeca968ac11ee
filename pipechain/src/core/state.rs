//! Lifecycle states of a single pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one pipeline run.
///
/// `Seeded -> Running -> {Delivering, Terminated, Failed}`, with
/// `Delivering` looping back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Contexts created, initial request queued at stage 0.
    #[default]
    Seeded,
    /// Choosing the next processing step.
    Running,
    /// A processor callback is executing and its output is being routed.
    Delivering,
    /// End-of-pipe reached the caller.
    Terminated,
    /// The run aborted with an error.
    Failed,
}

impl RunState {
    /// Returns true if the run can make no further progress.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Seeded, Self::Running)
                | (Self::Running, Self::Delivering | Self::Terminated | Self::Failed)
                | (Self::Delivering, Self::Running | Self::Terminated | Self::Failed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seeded => write!(f, "seeded"),
            Self::Running => write!(f, "running"),
            Self::Delivering => write!(f, "delivering"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

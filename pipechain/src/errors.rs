//! Error types for pipeline execution.
//!
//! Every run-time failure is fatal for the run it occurs in and is returned
//! from `execute` as a single [`PipelineError`].

use crate::core::MessageKind;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline definition is invalid.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// No stage had a pending request or response before end-of-pipe
    /// reached the caller.
    #[error("No stage with pending requests/responses found after {steps} steps ({stage_count} stages)")]
    Starvation {
        /// Processing steps executed before the stall.
        steps: u64,
        /// Number of stages in the pipeline.
        stage_count: usize,
    },

    /// A processor failed while handling a message.
    #[error("Processor '{processor}' at stage {stage} failed handling {kind}: {source}")]
    Processor {
        /// Index of the failing stage.
        stage: usize,
        /// Name of the failing processor.
        processor: String,
        /// The kind of message being handled.
        kind: MessageKind,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The caller's response handler failed.
    #[error("Response handler failed: {source}")]
    Handler {
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// The terminal stage tried to send a request downstream.
    #[error("Processor '{processor}' at terminal stage {stage} attempted to send a request downstream")]
    BoundaryViolation {
        /// Index of the offending stage.
        stage: usize,
        /// Name of the offending processor.
        processor: String,
    },

    /// The run exceeded the configured step limit.
    #[error("Pipeline run exceeded the step limit of {limit}")]
    StepLimitExceeded {
        /// The configured limit.
        limit: u64,
    },
}

impl PipelineError {
    /// Wraps a processor failure with its stage context.
    pub fn processor(
        stage: usize,
        processor: impl Into<String>,
        kind: MessageKind,
        source: anyhow::Error,
    ) -> Self {
        Self::Processor {
            stage,
            processor: processor.into(),
            kind,
            source,
        }
    }

    /// Wraps a response handler failure.
    pub fn handler(source: anyhow::Error) -> Self {
        Self::Handler { source }
    }

    /// Returns a stable code identifying the error category.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "PIPE-000-VALIDATION",
            Self::Starvation { .. } => "PIPE-001-STARVATION",
            Self::Processor { .. } => "PIPE-002-PROCESSOR",
            Self::Handler { .. } => "PIPE-003-HANDLER",
            Self::BoundaryViolation { .. } => "PIPE-004-BOUNDARY",
            Self::StepLimitExceeded { .. } => "PIPE-005-STEP_LIMIT",
        }
    }

    /// Returns the stage index the error is attributed to, if any.
    #[must_use]
    pub const fn stage(&self) -> Option<usize> {
        match self {
            Self::Processor { stage, .. } | Self::BoundaryViolation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.error_code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));

        match self {
            Self::Starvation { steps, stage_count } => {
                map.insert("steps".to_string(), serde_json::json!(steps));
                map.insert("stage_count".to_string(), serde_json::json!(stage_count));
            }
            Self::Processor {
                stage,
                processor,
                kind,
                ..
            } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("processor".to_string(), serde_json::json!(processor));
                map.insert("kind".to_string(), serde_json::json!(kind));
            }
            Self::BoundaryViolation { stage, processor } => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                map.insert("processor".to_string(), serde_json::json!(processor));
            }
            Self::StepLimitExceeded { limit } => {
                map.insert("limit".to_string(), serde_json::json!(limit));
            }
            Self::Validation(_) | Self::Handler { .. } => {}
        }

        map
    }
}

/// Error returned to a processor by its stage context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The last stage has no downstream neighbour.
    #[error("Stage {stage} is the last stage and cannot send requests downstream")]
    NoDownstream {
        /// Index of the sending stage.
        stage: usize,
    },
}

/// Error raised when a pipeline definition fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fix_hint: None,
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }
}

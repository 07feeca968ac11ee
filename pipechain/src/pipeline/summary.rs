//! Outcome of a successful pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters and timing of one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The run identifier.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Number of stages.
    pub stage_count: usize,
    /// Total processing steps (processor callbacks).
    pub steps: u64,
    /// Requests delivered to processors.
    pub requests_processed: u64,
    /// Responses delivered to processors.
    pub responses_processed: u64,
    /// Non-terminal responses handed to the response handler.
    pub responses_delivered: u64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall time of the run in milliseconds.
    pub duration_ms: f64,
}

impl RunSummary {
    /// Converts to a JSON event payload.
    #[must_use]
    pub fn to_event_data(&self) -> serde_json::Value {
        serde_json::json!({
            "run_id": self.run_id.to_string(),
            "pipeline": &self.pipeline,
            "stage_count": self.stage_count,
            "steps": self.steps,
            "requests_processed": self.requests_processed,
            "responses_processed": self.responses_processed,
            "responses_delivered": self.responses_delivered,
            "duration_ms": self.duration_ms,
        })
    }
}

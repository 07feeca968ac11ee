//! Test assertions for pipeline runs.

use crate::errors::PipelineError;
use crate::pipeline::RunSummary;

/// Asserts that a run failed with the given error code.
///
/// # Panics
///
/// Panics if the run succeeded or failed with another code.
pub fn assert_error_code<T: std::fmt::Debug>(result: &Result<T, PipelineError>, code: &str) {
    match result {
        Ok(value) => panic!("Expected error {code}, got success: {value:?}"),
        Err(err) => assert_eq!(
            err.error_code(),
            code,
            "Expected error {code}, got {}: {err}",
            err.error_code()
        ),
    }
}

/// Asserts that a run stalled.
///
/// # Panics
///
/// Panics unless the result is a starvation error.
pub fn assert_starved<T: std::fmt::Debug>(result: &Result<T, PipelineError>) {
    assert_error_code(result, "PIPE-001-STARVATION");
}

/// Asserts the step count of a completed run.
///
/// # Panics
///
/// Panics if the step count differs.
pub fn assert_steps(summary: &RunSummary, expected: u64) {
    assert_eq!(
        summary.steps, expected,
        "Expected {expected} steps, run '{}' took {}",
        summary.pipeline, summary.steps
    );
}

/// Asserts that a completed run processed every request and response it
/// counted as a step.
///
/// # Panics
///
/// Panics if the counters disagree.
pub fn assert_balanced(summary: &RunSummary) {
    assert_eq!(
        summary.requests_processed + summary.responses_processed,
        summary.steps,
        "Step counters out of balance: {summary:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_error_code_matches() {
        let result: Result<(), PipelineError> = Err(PipelineError::StepLimitExceeded { limit: 3 });
        assert_error_code(&result, "PIPE-005-STEP_LIMIT");
    }

    #[test]
    #[should_panic(expected = "got success")]
    fn test_assert_error_code_on_success() {
        let result: Result<u8, PipelineError> = Ok(1);
        assert_error_code(&result, "PIPE-001-STARVATION");
    }
}

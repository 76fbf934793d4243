//! Aggregated outcome of a whole pipeline run.

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use std::time::Duration;

use framepipe_model::StepResult;

/// Everything a caller needs to know about one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub pipeline_id: String,
    /// True when every recorded step succeeded or was deliberately skipped.
    pub success: bool,
    /// The final working dataset. Present on success, and also on failure
    /// when a partially transformed frame is still meaningful to the caller.
    pub data: Option<DataFrame>,
    /// Per-step results in execution order.
    pub trail: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub rows_in: usize,
    pub rows_out: usize,
    pub total_errors: usize,
    pub total_warnings: usize,
    /// Message of the step failure that ended the run, when one did.
    pub error_message: Option<String>,
}

impl PipelineResult {
    /// Number of steps that actually executed (skipped ones included).
    pub fn steps_run(&self) -> usize {
        self.trail.len()
    }

    pub fn steps_failed(&self) -> usize {
        self.trail.iter().filter(|r| !r.success && !r.skipped).count()
    }

    pub fn steps_skipped(&self) -> usize {
        self.trail.iter().filter(|r| r.skipped).count()
    }

    /// Result for a named step, if it ran.
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.trail.iter().find(|r| r.step_name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(trail: Vec<StepResult>) -> PipelineResult {
        PipelineResult {
            pipeline_id: "p1".to_string(),
            success: trail.iter().all(|r| r.success || r.skipped),
            data: None,
            trail,
            started_at: Utc::now(),
            duration: Duration::from_millis(1),
            rows_in: 0,
            rows_out: 0,
            total_errors: 0,
            total_warnings: 0,
            error_message: None,
        }
    }

    #[test]
    fn counts_distinguish_failed_from_skipped() {
        let mut skipped = StepResult::failed("a", "filter", "boom");
        skipped.skipped = true;
        let failed = StepResult::failed("b", "filter", "boom");
        let ok = StepResult::succeeded("c", "select");
        let result = result_with(vec![skipped, failed, ok]);
        assert_eq!(result.steps_run(), 3);
        assert_eq!(result.steps_failed(), 1);
        assert_eq!(result.steps_skipped(), 1);
        assert!(!result.success);
        assert!(result.step("b").is_some());
        assert!(result.step("missing").is_none());
    }
}

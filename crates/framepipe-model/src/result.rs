//! Per-step execution records.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::finding::{Finding, Judgment, Severity};

/// Immutable record of one executed step, appended to the run trail.
///
/// Produced exactly once per executed step; steps never reached because of a
/// fail-fast abort leave no record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub step_type: String,
    pub success: bool,
    /// True when the step failed but its `skip` policy swallowed the failure.
    /// Skipped failures do not count against overall pipeline success.
    #[serde(default)]
    pub skipped: bool,
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_in: usize,
    pub columns_out: usize,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Distinct rows implicated by error findings (judging steps only).
    #[serde(default)]
    pub rows_failed: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl StepResult {
    /// Record for a step that completed without findings.
    pub fn succeeded(step_name: &str, step_type: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            step_type: step_type.to_string(),
            success: true,
            skipped: false,
            rows_in: 0,
            rows_out: 0,
            columns_in: 0,
            columns_out: 0,
            duration: Duration::ZERO,
            error_message: None,
            rows_failed: 0,
            findings: Vec::new(),
        }
    }

    /// Record for a failed step carrying the failure message.
    pub fn failed(step_name: &str, step_type: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            ..Self::succeeded(step_name, step_type)
        }
    }

    /// Record for a judging step; success and findings come from the verdict.
    pub fn judged(step_name: &str, step_type: &str, judgment: Judgment) -> Self {
        let success = judgment.is_valid();
        let error_message = judgment.first_error().map(str::to_string);
        Self {
            success,
            error_message,
            rows_failed: judgment.rows_failed,
            findings: judgment.findings,
            ..Self::succeeded(step_name, step_type)
        }
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }
}

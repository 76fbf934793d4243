//! Findings produced by judging steps.

use serde::{Deserialize, Serialize};

/// Number of failing values kept on a finding as a sample.
pub const FAILURE_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One violation (or demoted warning) detected by a judging step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Identifier of the check that produced this finding.
    pub check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub severity: Severity,
    pub message: String,
    /// Sample of offending values, capped at [`FAILURE_SAMPLE_LIMIT`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_values: Vec<String>,
    /// Indices of the failing rows, when the check tracks them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_indices: Vec<usize>,
}

impl Finding {
    pub fn error(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            column: None,
            severity: Severity::Error,
            message: message.into(),
            failure_values: Vec::new(),
            row_indices: Vec::new(),
        }
    }

    pub fn warning(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(check, message)
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.row_indices = rows;
        self
    }

    /// Attach a failure sample, truncating to [`FAILURE_SAMPLE_LIMIT`].
    pub fn with_failure_values(mut self, mut values: Vec<String>) -> Self {
        values.truncate(FAILURE_SAMPLE_LIMIT);
        self.failure_values = values;
        self
    }

    /// Demote this finding to a warning, keeping everything else.
    pub fn demoted(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }
}

/// The verdict of a judging step over one dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Judgment {
    pub findings: Vec<Finding>,
    /// Distinct rows implicated by at least one error finding.
    pub rows_failed: u64,
}

impl Judgment {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn new(findings: Vec<Finding>, rows_failed: u64) -> Self {
        Self {
            findings,
            rows_failed,
        }
    }

    /// A judgment is valid when no error-severity finding is present.
    pub fn is_valid(&self) -> bool {
        !self
            .findings
            .iter()
            .any(|f| f.severity == Severity::Error)
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

    /// Message of the first error finding, used as the step error summary.
    pub fn first_error(&self) -> Option<&str> {
        self.findings
            .iter()
            .find(|f| f.severity == Severity::Error)
            .map(|f| f.message.as_str())
    }
}

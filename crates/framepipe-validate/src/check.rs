//! The reusable check contract shared by all judging stages.

use anyhow::{Result, bail};
use polars::prelude::DataFrame;

use framepipe_model::StepConfig;

/// What one check run reports back to its stage.
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Human-readable failure description; empty on a pass.
    pub message: Option<String>,
    /// Sample of offending values.
    pub failure_values: Vec<String>,
    /// Indices of the failing rows.
    pub row_indices: Vec<usize>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_rows(mut self, rows: Vec<usize>) -> Self {
        self.row_indices = rows;
        self
    }

    pub fn with_failure_values(mut self, values: Vec<String>) -> Self {
        self.failure_values = values;
        self
    }
}

/// A reusable data quality check.
///
/// A check implements the entry point matching its shape: single-column
/// checks override [`Check::check_column`], multi-column checks
/// [`Check::check_columns`], whole-frame checks [`Check::check_frame`].
/// Calling an entry point the check does not support is a rule
/// configuration error.
pub trait Check: Send + Sync {
    fn check_column(&self, _df: &DataFrame, _column: &str, _params: &StepConfig) -> Result<CheckOutcome> {
        bail!("check does not operate on a single column")
    }

    fn check_columns(
        &self,
        _df: &DataFrame,
        _columns: &[String],
        _params: &StepConfig,
    ) -> Result<CheckOutcome> {
        bail!("check does not operate on multiple columns")
    }

    fn check_frame(&self, _df: &DataFrame, _params: &StepConfig) -> Result<CheckOutcome> {
        bail!("check does not operate on a whole frame")
    }
}

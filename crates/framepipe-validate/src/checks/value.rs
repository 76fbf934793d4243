//! Single-column value checks.

use anyhow::{Result, bail};
use polars::prelude::DataFrame;
use regex::Regex;

use framepipe_core::config::{optional_bool, optional_f64, require_str};
use framepipe_core::data_utils::{any_to_f64, any_to_string, is_missing_value};
use framepipe_model::StepConfig;

use crate::check::{Check, CheckOutcome};
use crate::checks::column;

/// Fails rows whose value is null or blank.
pub struct NonEmptyCheck;

impl Check for NonEmptyCheck {
    fn check_column(&self, df: &DataFrame, name: &str, _params: &StepConfig) -> Result<CheckOutcome> {
        let series = column(df, name)?;
        let mut rows = Vec::new();
        for idx in 0..df.height() {
            if is_missing_value(&series.get(idx)?) {
                rows.push(idx);
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(
            CheckOutcome::fail(format!("column '{name}': {} missing value(s)", rows.len()))
                .with_rows(rows),
        )
    }
}

/// Fails non-missing values that do not match a regex. Missing values are
/// NonEmptyCheck's business, not this check's.
pub struct PatternCheck;

impl Check for PatternCheck {
    fn check_column(&self, df: &DataFrame, name: &str, params: &StepConfig) -> Result<CheckOutcome> {
        let pattern = require_str(params, "pattern", "pattern")?;
        let regex = Regex::new(&pattern)?;
        let series = column(df, name)?;
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let any = series.get(idx)?;
            if is_missing_value(&any) {
                continue;
            }
            let rendered = any_to_string(any);
            if !regex.is_match(&rendered) {
                rows.push(idx);
                values.push(rendered);
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "column '{name}': {} value(s) do not match pattern '{pattern}'",
            rows.len()
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

/// Fails non-missing values outside a numeric interval. Non-numeric values
/// count as failures.
pub struct InRangeCheck;

impl Check for InRangeCheck {
    fn check_column(&self, df: &DataFrame, name: &str, params: &StepConfig) -> Result<CheckOutcome> {
        let min = optional_f64(params, "in_range", "min")?;
        let max = optional_f64(params, "in_range", "max")?;
        if min.is_none() && max.is_none() {
            bail!("in_range: requires at least one of 'min' or 'max'");
        }
        let series = column(df, name)?;
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let any = series.get(idx)?;
            if is_missing_value(&any) {
                continue;
            }
            let in_range = any_to_f64(any.clone()).is_some_and(|v| {
                min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
            });
            if !in_range {
                rows.push(idx);
                values.push(any_to_string(any));
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        let bounds = match (min, max) {
            (Some(min), Some(max)) => format!("[{min}, {max}]"),
            (Some(min), None) => format!(">= {min}"),
            (None, Some(max)) => format!("<= {max}"),
            (None, None) => unreachable!(),
        };
        Ok(CheckOutcome::fail(format!(
            "column '{name}': {} value(s) outside {bounds}",
            rows.len()
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

/// Fails non-missing values that are not strictly positive numbers.
pub struct PositiveNumberCheck;

impl Check for PositiveNumberCheck {
    fn check_column(&self, df: &DataFrame, name: &str, params: &StepConfig) -> Result<CheckOutcome> {
        let allow_zero = optional_bool(params, "positive_number", "allow_zero", false)?;
        let series = column(df, name)?;
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let any = series.get(idx)?;
            if is_missing_value(&any) {
                continue;
            }
            let positive = any_to_f64(any.clone())
                .is_some_and(|v| if allow_zero { v >= 0.0 } else { v > 0.0 });
            if !positive {
                rows.push(idx);
                values.push(any_to_string(any));
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "column '{name}': {} non-positive value(s)",
            rows.len()
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

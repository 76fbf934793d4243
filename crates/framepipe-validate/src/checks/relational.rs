//! Checks spanning multiple columns or referencing external value sets.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use framepipe_core::config::require_str;
use framepipe_core::data_utils::{column_value_string, is_missing_value};
use framepipe_model::StepConfig;

use crate::check::{Check, CheckOutcome};
use crate::checks::column;

fn row_key(df: &DataFrame, columns: &[String], idx: usize) -> String {
    let mut key = String::new();
    for name in columns {
        key.push_str(&column_value_string(df, name, idx));
        key.push('\u{1f}');
    }
    key
}

/// Fails every repeat of an already-seen combination of the key columns.
pub struct UniqueCombinationCheck;

impl Check for UniqueCombinationCheck {
    fn check_columns(
        &self,
        df: &DataFrame,
        columns: &[String],
        _params: &StepConfig,
    ) -> Result<CheckOutcome> {
        if columns.is_empty() {
            bail!("unique_combination: requires at least one column");
        }
        for name in columns {
            column(df, name)?;
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let key = row_key(df, columns, idx);
            if seen.insert(key, idx).is_some() {
                rows.push(idx);
                values.push(
                    columns
                        .iter()
                        .map(|name| column_value_string(df, name, idx))
                        .collect::<Vec<_>>()
                        .join("/"),
                );
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "{} duplicate combination(s) of ({})",
            rows.len(),
            columns.join(", ")
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

/// Requires the given columns to be filled on rows where a trigger column
/// holds a specific value.
pub struct ConditionalRequiredCheck;

impl Check for ConditionalRequiredCheck {
    fn check_columns(
        &self,
        df: &DataFrame,
        columns: &[String],
        params: &StepConfig,
    ) -> Result<CheckOutcome> {
        let when_column = require_str(params, "conditional_required", "when_column")?;
        let Some(equals) = params.get("equals") else {
            bail!("conditional_required: missing required param 'equals'");
        };
        let expected = match equals {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        column(df, &when_column)?;
        for name in columns {
            column(df, name)?;
        }

        let mut rows = Vec::new();
        for idx in 0..df.height() {
            if column_value_string(df, &when_column, idx) != expected {
                continue;
            }
            for name in columns {
                let series = column(df, name)?;
                if is_missing_value(&series.get(idx)?) {
                    rows.push(idx);
                    break;
                }
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "{} row(s) with '{when_column}' = '{expected}' missing a required value in ({})",
            rows.len(),
            columns.join(", ")
        ))
        .with_rows(rows))
    }
}

/// Fails rows where a start date falls after its end date.
///
/// Values that do not parse with the configured format are left to the
/// pattern or schema checks.
pub struct DateOrderCheck;

impl Check for DateOrderCheck {
    fn check_columns(
        &self,
        df: &DataFrame,
        columns: &[String],
        params: &StepConfig,
    ) -> Result<CheckOutcome> {
        let [start, end] = columns else {
            bail!("date_order: requires exactly two columns (start, end)");
        };
        let format = match params.get("format") {
            Some(Value::String(f)) => f.clone(),
            _ => "%Y-%m-%d".to_string(),
        };
        column(df, start)?;
        column(df, end)?;

        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let start_raw = column_value_string(df, start, idx);
            let end_raw = column_value_string(df, end, idx);
            let parsed = (
                NaiveDate::parse_from_str(&start_raw, &format),
                NaiveDate::parse_from_str(&end_raw, &format),
            );
            if let (Ok(start_date), Ok(end_date)) = parsed
                && start_date > end_date
            {
                rows.push(idx);
                values.push(format!("{start_raw} > {end_raw}"));
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "{} row(s) where '{start}' is after '{end}'",
            rows.len()
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

/// Fails non-missing values absent from an allowed value set.
///
/// The referential validation stage injects the `allowed` param from the
/// reference dataset's column.
pub struct ExistsInCheck;

impl Check for ExistsInCheck {
    fn check_column(&self, df: &DataFrame, name: &str, params: &StepConfig) -> Result<CheckOutcome> {
        let Some(Value::Array(allowed)) = params.get("allowed") else {
            bail!("exists_in: missing required param 'allowed' (a list)");
        };
        let allowed: HashSet<String> = allowed
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        let series = column(df, name)?;

        let mut rows = Vec::new();
        let mut values = Vec::new();
        for idx in 0..df.height() {
            let any = series.get(idx)?;
            if is_missing_value(&any) {
                continue;
            }
            let rendered = column_value_string(df, name, idx);
            if !allowed.contains(&rendered) {
                rows.push(idx);
                values.push(rendered);
            }
        }
        if rows.is_empty() {
            return Ok(CheckOutcome::pass());
        }
        Ok(CheckOutcome::fail(format!(
            "column '{name}': {} value(s) not present in the allowed set",
            rows.len()
        ))
        .with_rows(rows)
        .with_failure_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> StepConfig {
        serde_json::from_value(value).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unique_combination_flags_repeats_only() {
        let df = df!(
            "subject" => ["s1", "s1", "s2", "s1"],
            "visit" => ["v1", "v2", "v1", "v1"],
        )
        .unwrap();
        let outcome = UniqueCombinationCheck
            .check_columns(&df, &cols(&["subject", "visit"]), &StepConfig::new())
            .unwrap();
        assert_eq!(outcome.row_indices, vec![3]);
        assert_eq!(outcome.failure_values, vec!["s1/v1".to_string()]);
    }

    #[test]
    fn conditional_required_only_looks_at_triggered_rows() {
        let df = df!(
            "status" => ["done", "pending", "done"],
            "completed_on" => [Some("2026-01-02"), None, None],
        )
        .unwrap();
        let outcome = ConditionalRequiredCheck
            .check_columns(
                &df,
                &cols(&["completed_on"]),
                &params(json!({"when_column": "status", "equals": "done"})),
            )
            .unwrap();
        assert_eq!(outcome.row_indices, vec![2]);
    }

    #[test]
    fn date_order_ignores_unparseable_values() {
        let df = df!(
            "start" => ["2026-01-05", "garbage", "2026-02-01"],
            "end" => ["2026-01-02", "2026-01-01", "2026-03-01"],
        )
        .unwrap();
        let outcome = DateOrderCheck
            .check_columns(&df, &cols(&["start", "end"]), &StepConfig::new())
            .unwrap();
        assert_eq!(outcome.row_indices, vec![0]);
        assert_eq!(outcome.failure_values, vec!["2026-01-05 > 2026-01-02".to_string()]);
    }

    #[test]
    fn exists_in_checks_against_allowed_set() {
        let df = df!("site" => [Some("s1"), Some("s9"), None]).unwrap();
        let outcome = ExistsInCheck
            .check_column(&df, "site", &params(json!({"allowed": ["s1", "s2"]})))
            .unwrap();
        assert_eq!(outcome.row_indices, vec![1]);
        assert_eq!(outcome.failure_values, vec!["s9".to_string()]);
    }

    #[test]
    fn date_order_requires_two_columns() {
        let df = df!("start" => ["2026-01-01"]).unwrap();
        assert!(DateOrderCheck
            .check_columns(&df, &cols(&["start"]), &StepConfig::new())
            .is_err());
    }
}

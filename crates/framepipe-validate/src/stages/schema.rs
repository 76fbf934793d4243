//! Declarative schema validation stage.

use anyhow::{Result, bail};
use polars::prelude::{BooleanChunked, DataFrame, DataType, IntoLazy, NewChunkedArray, col};
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use framepipe_core::config::optional_bool;
use framepipe_core::data_utils::{any_to_f64, any_to_string, is_missing_value};
use framepipe_core::dtype::parse_dtype;
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::{Finding, Judgment, StepDefinition};

enum ColumnCheck {
    GreaterThan(f64),
    LessThan(f64),
    InRange { min: Option<f64>, max: Option<f64> },
    IsIn(HashSet<String>),
    StrMatches(Regex),
}

impl ColumnCheck {
    fn id(&self) -> &'static str {
        match self {
            Self::GreaterThan(_) => "greater_than",
            Self::LessThan(_) => "less_than",
            Self::InRange { .. } => "in_range",
            Self::IsIn(_) => "isin",
            Self::StrMatches(_) => "str_matches",
        }
    }

    fn accepts(&self, rendered: &str, numeric: Option<f64>) -> bool {
        match self {
            Self::GreaterThan(limit) => numeric.is_some_and(|v| v > *limit),
            Self::LessThan(limit) => numeric.is_some_and(|v| v < *limit),
            Self::InRange { min, max } => numeric.is_some_and(|v| {
                min.is_none_or(|m| v >= m) && max.is_none_or(|m| v <= m)
            }),
            Self::IsIn(allowed) => allowed.contains(rendered),
            Self::StrMatches(regex) => regex.is_match(rendered),
        }
    }
}

struct ColumnSpec {
    name: String,
    dtype: Option<(String, DataType)>,
    nullable: bool,
    unique: bool,
    checks: Vec<ColumnCheck>,
}

impl ColumnSpec {
    fn parse(name: &str, raw: &Value) -> Result<Self> {
        let mut spec = Self {
            name: name.to_string(),
            dtype: None,
            nullable: true,
            unique: false,
            checks: Vec::new(),
        };
        let declared = match raw {
            Value::String(dtype) => {
                spec.dtype = Some(Self::parse_dtype_name(name, dtype)?);
                return Ok(spec);
            }
            Value::Object(map) => map,
            other => bail!("schema_validation: spec for '{name}' must be a string or object, got {other}"),
        };
        if let Some(dtype) = declared.get("dtype") {
            let Some(dtype) = dtype.as_str() else {
                bail!("schema_validation: dtype for '{name}' must be a string");
            };
            spec.dtype = Some(Self::parse_dtype_name(name, dtype)?);
        }
        if let Some(nullable) = declared.get("nullable") {
            spec.nullable = nullable
                .as_bool()
                .ok_or_else(|| anyhow::anyhow!("schema_validation: 'nullable' for '{name}' must be a boolean"))?;
        }
        if let Some(unique) = declared.get("unique") {
            spec.unique = unique
                .as_bool()
                .ok_or_else(|| anyhow::anyhow!("schema_validation: 'unique' for '{name}' must be a boolean"))?;
        }
        if let Some(checks) = declared.get("checks") {
            let Some(checks) = checks.as_object() else {
                bail!("schema_validation: 'checks' for '{name}' must be an object");
            };
            for (kind, arg) in checks {
                spec.checks.push(Self::parse_check(name, kind, arg)?);
            }
        }
        Ok(spec)
    }

    fn parse_dtype_name(column: &str, dtype: &str) -> Result<(String, DataType)> {
        let parsed = parse_dtype(dtype).ok_or_else(|| {
            anyhow::anyhow!("schema_validation: unknown dtype '{dtype}' for '{column}'")
        })?;
        Ok((dtype.to_string(), parsed))
    }

    fn parse_check(column: &str, kind: &str, arg: &Value) -> Result<ColumnCheck> {
        let number = |value: &Value| -> Result<f64> {
            value.as_f64().ok_or_else(|| {
                anyhow::anyhow!("schema_validation: '{kind}' for '{column}' must be a number")
            })
        };
        match kind {
            "greater_than" => Ok(ColumnCheck::GreaterThan(number(arg)?)),
            "less_than" => Ok(ColumnCheck::LessThan(number(arg)?)),
            "in_range" => {
                let Some(bounds) = arg.as_object() else {
                    bail!("schema_validation: 'in_range' for '{column}' must be an object");
                };
                let min = bounds.get("min").map(&number).transpose()?;
                let max = bounds.get("max").map(&number).transpose()?;
                if min.is_none() && max.is_none() {
                    bail!("schema_validation: 'in_range' for '{column}' needs 'min' or 'max'");
                }
                Ok(ColumnCheck::InRange { min, max })
            }
            "isin" => {
                let Some(items) = arg.as_array() else {
                    bail!("schema_validation: 'isin' for '{column}' must be a list");
                };
                let allowed = items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Ok(ColumnCheck::IsIn(allowed))
            }
            "str_matches" => {
                let Some(pattern) = arg.as_str() else {
                    bail!("schema_validation: 'str_matches' for '{column}' must be a string");
                };
                Ok(ColumnCheck::StrMatches(Regex::new(pattern)?))
            }
            other => bail!("schema_validation: unknown check '{other}' for '{column}'"),
        }
    }
}

/// Validates the working dataset against a declared schema.
///
/// With `coerce`, declared dtypes are cast leniently first, so unconvertible
/// values become nulls the nullable check can report. With
/// `drop_invalid_rows`, offending rows are removed and the cleaned frame
/// replaces the working dataset; `treat_dropped_as_failure = false` then
/// demotes the row-level findings to warnings so the step still succeeds.
pub struct SchemaValidationStep {
    columns: Vec<ColumnSpec>,
    coerce: bool,
    strict: bool,
    drop_invalid_rows: bool,
    treat_dropped_as_failure: bool,
}

impl SchemaValidationStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let Some(Value::Object(schema)) = stage.config.get("schema") else {
            bail!("schema_validation: missing required config 'schema' (an object)");
        };
        if schema.is_empty() {
            bail!("schema_validation: 'schema' cannot be empty");
        }
        let columns = schema
            .iter()
            .map(|(name, raw)| ColumnSpec::parse(name, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            coerce: optional_bool(&stage.config, "schema_validation", "coerce", false)?,
            strict: optional_bool(&stage.config, "schema_validation", "strict", false)?,
            drop_invalid_rows: optional_bool(
                &stage.config,
                "schema_validation",
                "drop_invalid_rows",
                false,
            )?,
            treat_dropped_as_failure: optional_bool(
                &stage.config,
                "schema_validation",
                "treat_dropped_as_failure",
                true,
            )?,
        })
    }

    fn structural_findings(&self, df: &DataFrame) -> Vec<Finding> {
        let mut findings = Vec::new();
        for spec in &self.columns {
            if df.column(&spec.name).is_err() {
                findings.push(
                    Finding::error("missing_column", format!("column '{}' is missing", spec.name))
                        .with_column(&spec.name),
                );
            }
        }
        if self.strict {
            let declared: HashSet<&str> = self.columns.iter().map(|s| s.name.as_str()).collect();
            for name in df.get_column_names_str() {
                if !declared.contains(name) {
                    findings.push(
                        Finding::error(
                            "unexpected_column",
                            format!("column '{name}' is not declared in the schema"),
                        )
                        .with_column(name),
                    );
                }
            }
        }
        findings
    }

    fn coerced(&self, df: &DataFrame) -> Result<DataFrame> {
        let exprs: Vec<_> = self
            .columns
            .iter()
            .filter(|spec| df.column(&spec.name).is_ok())
            .filter_map(|spec| {
                spec.dtype
                    .as_ref()
                    .map(|(_, dtype)| col(spec.name.as_str()).cast(dtype.clone()))
            })
            .collect();
        if exprs.is_empty() {
            return Ok(df.clone());
        }
        Ok(df.clone().lazy().with_columns(exprs).collect()?)
    }

    fn row_findings(
        &self,
        df: &DataFrame,
        failed_rows: &mut BTreeSet<usize>,
    ) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        for spec in &self.columns {
            let Ok(series) = df.column(&spec.name) else {
                continue;
            };

            if let Some((declared, dtype)) = &spec.dtype
                && !self.coerce
                && series.dtype() != dtype
            {
                findings.push(
                    Finding::error(
                        "dtype",
                        format!(
                            "column '{}' has dtype {}, expected {declared}",
                            spec.name,
                            series.dtype()
                        ),
                    )
                    .with_column(&spec.name),
                );
                continue;
            }

            if !spec.nullable {
                let mut rows = Vec::new();
                for idx in 0..df.height() {
                    if is_missing_value(&series.get(idx)?) {
                        rows.push(idx);
                    }
                }
                if !rows.is_empty() {
                    failed_rows.extend(rows.iter().copied());
                    findings.push(
                        Finding::error(
                            "nullable",
                            format!("column '{}': {} null value(s)", spec.name, rows.len()),
                        )
                        .with_column(&spec.name)
                        .with_rows(rows),
                    );
                }
            }

            if spec.unique {
                let mut seen = HashSet::new();
                let mut rows = Vec::new();
                let mut values = Vec::new();
                for idx in 0..df.height() {
                    let rendered = any_to_string(series.get(idx)?);
                    if !seen.insert(rendered.clone()) {
                        rows.push(idx);
                        values.push(rendered);
                    }
                }
                if !rows.is_empty() {
                    failed_rows.extend(rows.iter().copied());
                    findings.push(
                        Finding::error(
                            "unique",
                            format!("column '{}': {} duplicate value(s)", spec.name, rows.len()),
                        )
                        .with_column(&spec.name)
                        .with_rows(rows)
                        .with_failure_values(values),
                    );
                }
            }

            for check in &spec.checks {
                let mut rows = Vec::new();
                let mut values = Vec::new();
                for idx in 0..df.height() {
                    let any = series.get(idx)?;
                    if is_missing_value(&any) {
                        continue;
                    }
                    let rendered = any_to_string(any.clone());
                    if !check.accepts(&rendered, any_to_f64(any)) {
                        rows.push(idx);
                        values.push(rendered);
                    }
                }
                if !rows.is_empty() {
                    failed_rows.extend(rows.iter().copied());
                    findings.push(
                        Finding::error(
                            check.id(),
                            format!(
                                "column '{}': {} value(s) fail '{}'",
                                spec.name,
                                rows.len(),
                                check.id()
                            ),
                        )
                        .with_column(&spec.name)
                        .with_rows(rows)
                        .with_failure_values(values),
                    );
                }
            }
        }
        Ok(findings)
    }
}

impl Step for SchemaValidationStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        let mut findings = self.structural_findings(df);

        let working = if self.coerce { self.coerced(df)? } else { df.clone() };
        let mut failed_rows = BTreeSet::new();
        findings.extend(self.row_findings(&working, &mut failed_rows)?);

        let rows_failed = failed_rows.len() as u64;
        let output = if self.drop_invalid_rows && !failed_rows.is_empty() {
            let keep: Vec<bool> = (0..working.height())
                .map(|idx| !failed_rows.contains(&idx))
                .collect();
            let mask = BooleanChunked::from_slice("keep".into(), &keep);
            working.filter(&mask)?
        } else {
            working
        };

        if self.drop_invalid_rows && !self.treat_dropped_as_failure {
            findings = findings
                .into_iter()
                .map(|finding| {
                    if finding.row_indices.is_empty() {
                        finding
                    } else {
                        finding.demoted()
                    }
                })
                .collect();
        }

        let judgment = Judgment::new(findings, rows_failed);
        if self.coerce || self.drop_invalid_rows {
            Ok(StepOutcome::JudgedWithOutput {
                judgment,
                output,
            })
        } else {
            Ok(StepOutcome::Judged(judgment))
        }
    }
}

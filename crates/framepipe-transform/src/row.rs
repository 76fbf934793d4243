//! Row-shaping steps: filter, sort, unique, head, tail, drop_nulls.

use anyhow::{Result, bail};
use polars::prelude::{
    BooleanChunked, Expr, IntoLazy, NewChunkedArray, SortMultipleOptions, col, lit,
};
use serde_json::Value;
use std::collections::HashSet;

use framepipe_core::config::{optional_str_list, optional_usize, require_str};
use framepipe_core::data_utils::column_value_string;
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::StepDefinition;

use crate::value::scalar_to_lit;

/// Comparison operators accepted by the filter step.
enum FilterOp {
    Eq(Expr),
    Ne(Expr),
    Gt(Expr),
    Ge(Expr),
    Lt(Expr),
    Le(Expr),
    IsNull,
    IsNotNull,
    In(Vec<Expr>),
}

/// Keep rows where a column comparison holds.
pub struct FilterStep {
    column: String,
    op: FilterOp,
}

impl FilterStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let column = require_str(&stage.config, "filter", "column")?;
        let op_name = require_str(&stage.config, "filter", "op")?;
        let value = stage.config.get("value");

        let scalar = |value: Option<&Value>| -> Result<Expr> {
            let Some(value) = value else {
                bail!("filter: operator '{op_name}' requires 'value'");
            };
            scalar_to_lit(value)
        };

        let op = match op_name.as_str() {
            "eq" => FilterOp::Eq(scalar(value)?),
            "ne" => FilterOp::Ne(scalar(value)?),
            "gt" => FilterOp::Gt(scalar(value)?),
            "ge" => FilterOp::Ge(scalar(value)?),
            "lt" => FilterOp::Lt(scalar(value)?),
            "le" => FilterOp::Le(scalar(value)?),
            "is_null" => FilterOp::IsNull,
            "is_not_null" => FilterOp::IsNotNull,
            "in" => {
                let Some(Value::Array(items)) = value else {
                    bail!("filter: operator 'in' requires 'value' to be a list");
                };
                if items.is_empty() {
                    bail!("filter: operator 'in' requires a non-empty list");
                }
                FilterOp::In(items.iter().map(scalar_to_lit).collect::<Result<_>>()?)
            }
            other => bail!("filter: unknown operator '{other}'"),
        };
        Ok(Self { column, op })
    }

    fn predicate(&self) -> Expr {
        let column = col(self.column.as_str());
        match &self.op {
            FilterOp::Eq(v) => column.eq(v.clone()),
            FilterOp::Ne(v) => column.neq(v.clone()),
            FilterOp::Gt(v) => column.gt(v.clone()),
            FilterOp::Ge(v) => column.gt_eq(v.clone()),
            FilterOp::Lt(v) => column.lt(v.clone()),
            FilterOp::Le(v) => column.lt_eq(v.clone()),
            FilterOp::IsNull => column.is_null(),
            FilterOp::IsNotNull => column.is_not_null(),
            // parse guarantees at least one value
            FilterOp::In(values) => values
                .iter()
                .map(|v| col(self.column.as_str()).eq(v.clone()))
                .reduce(|a, b| a.or(b))
                .unwrap_or_else(|| lit(false)),
        }
    }
}

impl Step for FilterStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        if df.column(&self.column).is_err() {
            bail!("filter: column '{}' not found", self.column);
        }
        let filtered = df.clone().lazy().filter(self.predicate()).collect()?;
        Ok(StepOutcome::Replaced(filtered))
    }
}

/// Sort rows by one or more columns.
pub struct SortStep {
    by: Vec<String>,
    descending: Vec<bool>,
}

impl SortStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let by = match optional_str_list(&stage.config, "sort", "by")? {
            Some(by) if !by.is_empty() => by,
            _ => bail!("sort: missing required config 'by'"),
        };
        let descending = match stage.config.get("descending") {
            None | Some(Value::Null) => vec![false; by.len()],
            Some(Value::Bool(b)) => vec![*b; by.len()],
            Some(Value::Array(items)) => {
                let flags: Option<Vec<bool>> = items.iter().map(Value::as_bool).collect();
                let Some(flags) = flags else {
                    bail!("sort: 'descending' list must contain only booleans");
                };
                if flags.len() != by.len() {
                    bail!(
                        "sort: 'descending' has {} entries for {} sort columns",
                        flags.len(),
                        by.len()
                    );
                }
                flags
            }
            Some(other) => bail!("sort: 'descending' must be a boolean or list, got {other}"),
        };
        Ok(Self { by, descending })
    }
}

impl Step for SortStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        for name in &self.by {
            if df.column(name).is_err() {
                bail!("sort: column '{name}' not found");
            }
        }
        let options = SortMultipleOptions::default()
            .with_order_descending_multi(self.descending.clone())
            .with_maintain_order(true);
        let sorted = df.sort(self.by.clone(), options)?;
        Ok(StepOutcome::Replaced(sorted))
    }
}

/// Drop duplicate rows, keeping the first or last occurrence.
///
/// Dedupe works on a per-row key built from the subset columns' rendered
/// values, so the incoming row order is preserved for kept rows.
pub struct UniqueStep {
    subset: Option<Vec<String>>,
    keep_last: bool,
}

impl UniqueStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let keep = match stage.config.get("keep") {
            None | Some(Value::Null) => "first".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => bail!("unique: 'keep' must be a string, got {other}"),
        };
        let keep_last = match keep.as_str() {
            "first" => false,
            "last" => true,
            other => bail!("unique: 'keep' must be 'first' or 'last', got '{other}'"),
        };
        Ok(Self {
            subset: optional_str_list(&stage.config, "unique", "subset")?,
            keep_last,
        })
    }

    fn row_key(df: &polars::prelude::DataFrame, columns: &[String], idx: usize) -> String {
        let mut key = String::new();
        for column in columns {
            key.push_str(&column_value_string(df, column, idx));
            key.push('\u{1f}');
        }
        key
    }
}

impl Step for UniqueStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        let columns: Vec<String> = match &self.subset {
            Some(subset) => {
                for name in subset {
                    if df.column(name).is_err() {
                        bail!("unique: column '{name}' not found");
                    }
                }
                subset.clone()
            }
            None => df.get_column_names_str().iter().map(|s| s.to_string()).collect(),
        };

        let height = df.height();
        let mut keep = vec![false; height];
        let mut seen = HashSet::new();
        let order: Box<dyn Iterator<Item = usize>> = if self.keep_last {
            Box::new((0..height).rev())
        } else {
            Box::new(0..height)
        };
        for idx in order {
            if seen.insert(Self::row_key(df, &columns, idx)) {
                keep[idx] = true;
            }
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        Ok(StepOutcome::Replaced(df.filter(&mask)?))
    }
}

/// Keep the first `n` rows.
pub struct HeadStep {
    n: usize,
}

impl HeadStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            n: optional_usize(&stage.config, "head", "n", 10)?,
        })
    }
}

impl Step for HeadStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        Ok(StepOutcome::Replaced(ctx.data().head(Some(self.n))))
    }
}

/// Keep the last `n` rows.
pub struct TailStep {
    n: usize,
}

impl TailStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            n: optional_usize(&stage.config, "tail", "n", 10)?,
        })
    }
}

impl Step for TailStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        Ok(StepOutcome::Replaced(ctx.data().tail(Some(self.n))))
    }
}

/// Drop rows holding a null in any (or a subset of) columns.
pub struct DropNullsStep {
    subset: Option<Vec<String>>,
}

impl DropNullsStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            subset: optional_str_list(&stage.config, "drop_nulls", "subset")?,
        })
    }
}

impl Step for DropNullsStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        let dropped = match &self.subset {
            Some(subset) => {
                for name in subset {
                    if df.column(name).is_err() {
                        bail!("drop_nulls: column '{name}' not found");
                    }
                }
                let predicate = subset
                    .iter()
                    .map(|s| col(s.as_str()).is_not_null())
                    .reduce(|a, b| a.and(b))
                    .unwrap_or_else(|| lit(true));
                df.clone().lazy().filter(predicate).collect()?
            }
            None => df.clone().lazy().drop_nulls(None).collect()?,
        };
        Ok(StepOutcome::Replaced(dropped))
    }
}

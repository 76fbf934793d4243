//! Reshaping steps: pivot, unpivot, explode.

use anyhow::{Result, bail};
use polars::lazy::frame::pivot::pivot_stable;
use polars::prelude::{DataFrame, Expr, UnpivotArgsIR, UnpivotDF, col};

use framepipe_core::config::{optional_str, optional_str_list};
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::{StepConfig, StepDefinition};

fn require_columns(df: &DataFrame, columns: &[String], step_type: &str) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            bail!("{step_type}: column '{name}' not found");
        }
    }
    Ok(())
}

// single string or list, required
fn require_column_set(config: &StepConfig, step_type: &str, key: &str) -> Result<Vec<String>> {
    match optional_str_list(config, step_type, key)? {
        Some(list) if !list.is_empty() => Ok(list),
        Some(_) => bail!("{step_type}: '{key}' cannot be empty"),
        None => bail!("{step_type}: missing required config '{key}'"),
    }
}

/// Turn long data wide: distinct values of the `on` columns become new
/// columns, filled from the `values` columns per `index` row.
pub struct PivotStep {
    on: Vec<String>,
    index: Vec<String>,
    values: Vec<String>,
    aggregate: String,
}

impl PivotStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let step = Self {
            on: require_column_set(&stage.config, "pivot", "on")?,
            index: require_column_set(&stage.config, "pivot", "index")?,
            values: require_column_set(&stage.config, "pivot", "values")?,
            aggregate: optional_str(&stage.config, "pivot", "aggregate_function")?
                .unwrap_or_else(|| "first".to_string()),
        };
        // surfaces unknown aggregation names at build time
        let _ = step.agg_expr()?;
        Ok(step)
    }

    /// Aggregation over the cell group; `col("")` is the pivoted element.
    fn agg_expr(&self) -> Result<Expr> {
        let element = col("");
        Ok(match self.aggregate.as_str() {
            "first" => element.first(),
            "last" => element.last(),
            "sum" => element.sum(),
            "mean" => element.mean(),
            "min" => element.min(),
            "max" => element.max(),
            "count" => element.count(),
            other => bail!("pivot: unknown aggregate_function '{other}'"),
        })
    }
}

impl Step for PivotStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        require_columns(df, &self.on, "pivot")?;
        require_columns(df, &self.index, "pivot")?;
        require_columns(df, &self.values, "pivot")?;
        let pivoted = pivot_stable(
            df,
            self.on.clone(),
            Some(self.index.clone()),
            Some(self.values.clone()),
            false,
            Some(self.agg_expr()?),
            None,
        )?;
        Ok(StepOutcome::Replaced(pivoted))
    }
}

/// Turn wide data long: the `on` columns melt into variable/value pairs,
/// repeated per `index` row.
pub struct UnpivotStep {
    on: Vec<String>,
    index: Vec<String>,
    variable_name: Option<String>,
    value_name: Option<String>,
}

impl UnpivotStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            on: require_column_set(&stage.config, "unpivot", "on")?,
            index: optional_str_list(&stage.config, "unpivot", "index")?.unwrap_or_default(),
            variable_name: optional_str(&stage.config, "unpivot", "variable_name")?,
            value_name: optional_str(&stage.config, "unpivot", "value_name")?,
        })
    }
}

impl Step for UnpivotStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        require_columns(df, &self.on, "unpivot")?;
        require_columns(df, &self.index, "unpivot")?;
        let args = UnpivotArgsIR {
            on: self.on.iter().map(|s| s.as_str().into()).collect(),
            index: self.index.iter().map(|s| s.as_str().into()).collect(),
            variable_name: self.variable_name.as_deref().map(Into::into),
            value_name: self.value_name.as_deref().map(Into::into),
        };
        Ok(StepOutcome::Replaced(df.unpivot2(args)?))
    }
}

/// Explode list columns into one row per element.
pub struct ExplodeStep {
    columns: Vec<String>,
}

impl ExplodeStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            columns: require_column_set(&stage.config, "explode", "columns")?,
        })
    }
}

impl Step for ExplodeStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        require_columns(df, &self.columns, "explode")?;
        Ok(StepOutcome::Replaced(df.explode(self.columns.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use serde_json::json;

    fn stage(step_type: &str, config: serde_json::Value) -> StepDefinition {
        StepDefinition::new("test", step_type)
            .with_config(serde_json::from_value(config).unwrap())
    }

    fn frame(outcome: StepOutcome) -> DataFrame {
        match outcome {
            StepOutcome::Replaced(df) => df,
            _ => panic!("expected a replaced frame"),
        }
    }

    #[test]
    fn pivot_widens_and_aggregates() {
        let df = df!(
            "product" => ["a", "a", "b", "a"],
            "month" => ["jan", "feb", "jan", "jan"],
            "sales" => [10i64, 20, 30, 5],
        )
        .unwrap();
        let ctx = ExecutionContext::new("test", df);
        let step = PivotStep::from_stage(&stage(
            "pivot",
            json!({
                "on": "month",
                "index": "product",
                "values": "sales",
                "aggregate_function": "sum",
            }),
        ))
        .unwrap();
        let out = frame(step.execute(&ctx).unwrap());
        assert_eq!(out.get_column_names_str(), vec!["product", "jan", "feb"]);
        let jan: Vec<Option<i64>> = out.column("jan").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(jan, vec![Some(15), Some(30)]);
    }

    #[test]
    fn pivot_rejects_unknown_aggregate() {
        let err = PivotStep::from_stage(&stage(
            "pivot",
            json!({"on": "m", "index": "p", "values": "v", "aggregate_function": "median"}),
        ))
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown aggregate_function 'median'"));
    }

    #[test]
    fn unpivot_melts_named_columns() {
        let df = df!(
            "product" => ["a", "b"],
            "jan" => [10i64, 30],
            "feb" => [20i64, 40],
        )
        .unwrap();
        let ctx = ExecutionContext::new("test", df);
        let step = UnpivotStep::from_stage(&stage(
            "unpivot",
            json!({
                "on": ["jan", "feb"],
                "index": ["product"],
                "variable_name": "month",
                "value_name": "sales",
            }),
        ))
        .unwrap();
        let out = frame(step.execute(&ctx).unwrap());
        assert_eq!(out.height(), 4);
        assert_eq!(out.get_column_names_str(), vec!["product", "month", "sales"]);
    }

    #[test]
    fn explode_expands_list_cells() {
        let df = df!(
            "id" => ["x", "y"],
            "tags" => [
                Series::new("".into(), &["red", "blue"]),
                Series::new("".into(), &["green"]),
            ],
        )
        .unwrap();
        let ctx = ExecutionContext::new("test", df);
        let step =
            ExplodeStep::from_stage(&stage("explode", json!({"columns": "tags"}))).unwrap();
        let out = frame(step.execute(&ctx).unwrap());
        assert_eq!(out.height(), 3);
        let ids: Vec<&str> = out
            .column("id")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec!["x", "x", "y"]);
    }
}

//! Group-by aggregation step.

use anyhow::{Result, bail};
use polars::prelude::{Expr, IntoLazy, col};
use serde_json::Value;

use framepipe_core::config::require_str_list;
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::StepDefinition;

struct Aggregation {
    column: String,
    agg: String,
    alias: String,
}

impl Aggregation {
    fn expr(&self) -> Result<Expr> {
        let target = col(self.column.as_str());
        let expr = match self.agg.as_str() {
            "sum" => target.sum(),
            "mean" => target.mean(),
            "min" => target.min(),
            "max" => target.max(),
            "count" => target.count(),
            "first" => target.first(),
            "last" => target.last(),
            other => bail!("group_by: unknown aggregation '{other}'"),
        };
        Ok(expr.alias(self.alias.as_str()))
    }
}

/// Group rows by key columns and aggregate the rest.
///
/// Groups come out in first-seen order, so runs are reproducible.
pub struct GroupByStep {
    by: Vec<String>,
    aggregations: Vec<Aggregation>,
}

impl GroupByStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let by = require_str_list(&stage.config, "group_by", "by")?;
        let Some(Value::Array(raw)) = stage.config.get("aggregations") else {
            bail!("group_by: missing required config 'aggregations' (a list)");
        };
        if raw.is_empty() {
            bail!("group_by: 'aggregations' cannot be empty");
        }
        let mut aggregations = Vec::with_capacity(raw.len());
        for entry in raw {
            let Some(entry) = entry.as_object() else {
                bail!("group_by: each aggregation must be an object");
            };
            let Some(column) = entry.get("column").and_then(Value::as_str) else {
                bail!("group_by: aggregation requires 'column'");
            };
            let Some(agg) = entry.get("agg").and_then(Value::as_str) else {
                bail!("group_by: aggregation requires 'agg'");
            };
            let alias = entry
                .get("alias")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{column}_{agg}"));
            let aggregation = Aggregation {
                column: column.to_string(),
                agg: agg.to_string(),
                alias,
            };
            // surfaces unknown aggregation names at build time
            let _ = aggregation.expr()?;
            aggregations.push(aggregation);
        }
        Ok(Self { by, aggregations })
    }
}

impl Step for GroupByStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        for name in &self.by {
            if df.column(name).is_err() {
                bail!("group_by: column '{name}' not found");
            }
        }
        for aggregation in &self.aggregations {
            if df.column(&aggregation.column).is_err() {
                bail!("group_by: column '{}' not found", aggregation.column);
            }
        }

        let keys: Vec<Expr> = self.by.iter().map(|c| col(c.as_str())).collect();
        let aggs: Vec<Expr> = self
            .aggregations
            .iter()
            .map(Aggregation::expr)
            .collect::<Result<_>>()?;
        let grouped = df
            .clone()
            .lazy()
            .group_by_stable(keys)
            .agg(aggs)
            .collect()?;
        Ok(StepOutcome::Replaced(grouped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use serde_json::json;

    fn stage(config: serde_json::Value) -> StepDefinition {
        StepDefinition::new("test", "group_by")
            .with_config(serde_json::from_value(config).unwrap())
    }

    #[test]
    fn aggregates_in_first_seen_group_order() {
        let df = df!(
            "site" => ["s2", "s1", "s2", "s1"],
            "count" => [1i64, 2, 3, 4],
        )
        .unwrap();
        let ctx = ExecutionContext::new("test", df);
        let step = GroupByStep::from_stage(&stage(json!({
            "by": ["site"],
            "aggregations": [
                {"column": "count", "agg": "sum"},
                {"column": "count", "agg": "max", "alias": "peak"},
            ],
        })))
        .unwrap();
        let out = match step.execute(&ctx).unwrap() {
            StepOutcome::Replaced(df) => df,
            _ => panic!("expected a replaced frame"),
        };
        let sites: Vec<&str> = out
            .column("site")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(sites, vec!["s2", "s1"]);
        let sums: Vec<i64> = out
            .column("count_sum")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(sums, vec![4, 6]);
        assert!(out.column("peak").is_ok());
    }

    #[test]
    fn unknown_aggregation_fails_at_build() {
        let err = GroupByStep::from_stage(&stage(json!({
            "by": ["site"],
            "aggregations": [{"column": "count", "agg": "median"}],
        })))
        .err()
        .unwrap();
        assert!(err.to_string().contains("unknown aggregation 'median'"));
    }
}

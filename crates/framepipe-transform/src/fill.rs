//! Null-filling step.

use anyhow::{Result, bail};
use polars::prelude::{Expr, FillNullStrategy, IntoLazy, col, lit};

use framepipe_core::config::{optional_str_list, require_str};
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::StepDefinition;

use crate::value::scalar_to_lit;

enum FillStrategy {
    Value(Expr),
    Forward,
    Backward,
    Zero,
}

/// Replace nulls in the named columns (or all columns) by a strategy.
pub struct FillNullStep {
    columns: Option<Vec<String>>,
    strategy: FillStrategy,
}

impl FillNullStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let strategy = match require_str(&stage.config, "fill_null", "strategy")?.as_str() {
            "value" => {
                let Some(value) = stage.config.get("value") else {
                    bail!("fill_null: strategy 'value' requires 'value'");
                };
                FillStrategy::Value(scalar_to_lit(value)?)
            }
            "forward" => FillStrategy::Forward,
            "backward" => FillStrategy::Backward,
            "zero" => FillStrategy::Zero,
            other => bail!("fill_null: unknown strategy '{other}'"),
        };
        Ok(Self {
            columns: optional_str_list(&stage.config, "fill_null", "columns")?,
            strategy,
        })
    }

    fn fill(&self, target: Expr) -> Expr {
        match &self.strategy {
            FillStrategy::Value(value) => target.fill_null(value.clone()),
            FillStrategy::Forward => {
                target.fill_null_with_strategy(FillNullStrategy::Forward(None))
            }
            FillStrategy::Backward => {
                target.fill_null_with_strategy(FillNullStrategy::Backward(None))
            }
            FillStrategy::Zero => target.fill_null(lit(0)),
        }
    }
}

impl Step for FillNullStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        let exprs: Vec<Expr> = match &self.columns {
            Some(columns) => {
                for name in columns {
                    if df.column(name).is_err() {
                        bail!("fill_null: column '{name}' not found");
                    }
                }
                columns.iter().map(|c| self.fill(col(c.as_str()))).collect()
            }
            None => df
                .get_column_names()
                .into_iter()
                .map(|name| self.fill(col(name.as_str())))
                .collect(),
        };
        let filled = df.clone().lazy().with_columns(exprs).collect()?;
        Ok(StepOutcome::Replaced(filled))
    }
}

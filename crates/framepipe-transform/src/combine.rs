//! Steps combining the working dataset with auxiliary datasets.

use anyhow::{Result, bail};
use polars::prelude::{Expr, IntoLazy, JoinArgs, JoinType, col};

use framepipe_core::config::{optional_str, optional_str_list, require_str, require_str_list};
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::StepDefinition;

/// Join an auxiliary dataset onto the working dataset.
pub struct JoinStep {
    dataset: String,
    left_on: Vec<String>,
    right_on: Vec<String>,
    how: JoinType,
    suffix: Option<String>,
}

impl JoinStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let dataset = require_str(&stage.config, "join", "dataset")?;
        let on = optional_str_list(&stage.config, "join", "on")?;
        let left_on = optional_str_list(&stage.config, "join", "left_on")?;
        let right_on = optional_str_list(&stage.config, "join", "right_on")?;
        let (left_on, right_on) = match (on, left_on, right_on) {
            (Some(on), None, None) => (on.clone(), on),
            (None, Some(left), Some(right)) => {
                if left.len() != right.len() {
                    bail!("join: 'left_on' and 'right_on' must have the same length");
                }
                (left, right)
            }
            _ => bail!("join: specify either 'on' or both 'left_on' and 'right_on'"),
        };
        if left_on.is_empty() {
            bail!("join: key columns cannot be empty");
        }
        let how = match optional_str(&stage.config, "join", "how")?.as_deref() {
            None | Some("inner") => JoinType::Inner,
            Some("left") => JoinType::Left,
            Some("right") => JoinType::Right,
            Some("full") => JoinType::Full,
            Some(other) => bail!("join: unknown join kind '{other}'"),
        };
        Ok(Self {
            dataset,
            left_on,
            right_on,
            how,
            suffix: optional_str(&stage.config, "join", "suffix")?,
        })
    }
}

impl Step for JoinStep {
    fn required_datasets(&self) -> Vec<String> {
        vec![self.dataset.clone()]
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let left = ctx.data();
        let right = ctx.dataset(&self.dataset)?;
        for name in &self.left_on {
            if left.column(name).is_err() {
                bail!("join: column '{name}' not found in working dataset");
            }
        }
        for name in &self.right_on {
            if right.column(name).is_err() {
                bail!("join: column '{name}' not found in dataset '{}'", self.dataset);
            }
        }

        let left_keys: Vec<Expr> = self.left_on.iter().map(|c| col(c.as_str())).collect();
        let right_keys: Vec<Expr> = self.right_on.iter().map(|c| col(c.as_str())).collect();
        let mut args = JoinArgs::new(self.how.clone());
        if let Some(suffix) = &self.suffix {
            args.suffix = Some(suffix.as_str().into());
        }

        let joined = left
            .clone()
            .lazy()
            .join(right.clone().lazy(), left_keys, right_keys, args)
            .collect()?;
        Ok(StepOutcome::Replaced(joined))
    }
}

/// Stack auxiliary datasets under the working dataset.
///
/// All frames must share the working dataset's column layout.
pub struct ConcatStep {
    datasets: Vec<String>,
}

impl ConcatStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            datasets: require_str_list(&stage.config, "concat", "datasets")?,
        })
    }
}

impl Step for ConcatStep {
    fn required_datasets(&self) -> Vec<String> {
        self.datasets.clone()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let mut stacked = ctx.data().clone();
        for name in &self.datasets {
            stacked.vstack_mut(ctx.dataset(name)?)?;
        }
        Ok(StepOutcome::Replaced(stacked))
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
    fn left_join_brings_matching_columns() {
        let data = df!("site" => ["s1", "s2", "s9"], "count" => [1i64, 2, 3]).unwrap();
        let sites = df!("site" => ["s1", "s2"], "region" => ["north", "south"]).unwrap();
        let ctx = ExecutionContext::new("test", data).with_dataset("sites", sites);

        let step = JoinStep::from_stage(&stage(
            "join",
            json!({"dataset": "sites", "on": ["site"], "how": "left"}),
        ))
        .unwrap();
        let out = frame(step.execute(&ctx).unwrap());
        assert_eq!(out.height(), 3);
        let region = out.column("region").unwrap();
        assert_eq!(region.null_count(), 1);
    }

    #[test]
    fn join_requires_its_dataset() {
        let data = df!("site" => ["s1"]).unwrap();
        let ctx = ExecutionContext::new("test", data);
        let step = JoinStep::from_stage(&stage(
            "join",
            json!({"dataset": "sites", "on": ["site"]}),
        ))
        .unwrap();
        assert_eq!(step.required_datasets(), vec!["sites".to_string()]);
        assert!(step.execute(&ctx).is_err());
    }

    #[test]
    fn concat_stacks_rows_and_rejects_mismatched_layout() {
        let data = df!("id" => ["a"]).unwrap();
        let more = df!("id" => ["b", "c"]).unwrap();
        let bad = df!("other" => ["x"]).unwrap();
        let ctx = ExecutionContext::new("test", data)
            .with_dataset("more", more)
            .with_dataset("bad", bad);

        let step =
            ConcatStep::from_stage(&stage("concat", json!({"datasets": ["more"]}))).unwrap();
        assert_eq!(frame(step.execute(&ctx).unwrap()).height(), 3);

        let step =
            ConcatStep::from_stage(&stage("concat", json!({"datasets": ["bad"]}))).unwrap();
        assert!(step.execute(&ctx).is_err());
    }

    #[test]
    fn join_config_requires_consistent_keys() {
        let err = JoinStep::from_stage(&stage(
            "join",
            json!({"dataset": "sites", "left_on": ["a"], "right_on": ["b", "c"]}),
        ))
        .err()
        .unwrap();
        assert!(err.to_string().contains("same length"));
    }
}

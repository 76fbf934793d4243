//! Column-shaping steps: select, drop, rename, cast.

use anyhow::{Context, Result, bail};
use polars::prelude::{DataFrame, DataType, IntoLazy, col};

use framepipe_core::config::{optional_bool, require_map, require_str_list};
use framepipe_core::dtype::parse_dtype;
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::StepDefinition;

fn require_columns(df: &DataFrame, columns: &[String], step_type: &str) -> Result<()> {
    for name in columns {
        if df.column(name).is_err() {
            bail!("{step_type}: column '{name}' not found");
        }
    }
    Ok(())
}

/// Keep only the named columns, in the given order.
pub struct SelectStep {
    columns: Vec<String>,
}

impl SelectStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            columns: require_str_list(&stage.config, "select", "columns")?,
        })
    }
}

impl Step for SelectStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        require_columns(df, &self.columns, "select")?;
        let selected = df.select(self.columns.iter().cloned())?;
        Ok(StepOutcome::Replaced(selected))
    }
}

/// Remove the named columns.
pub struct DropStep {
    columns: Vec<String>,
}

impl DropStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        Ok(Self {
            columns: require_str_list(&stage.config, "drop", "columns")?,
        })
    }
}

impl Step for DropStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        require_columns(df, &self.columns, "drop")?;
        let remaining = df.drop_many(self.columns.iter().cloned());
        Ok(StepOutcome::Replaced(remaining))
    }
}

/// Rename columns by an old-to-new mapping.
pub struct RenameStep {
    mapping: Vec<(String, String)>,
}

impl RenameStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let raw = require_map(&stage.config, "rename", "mapping")?;
        let mut mapping = Vec::with_capacity(raw.len());
        for (old, new) in raw {
            let Some(new) = new.as_str() else {
                bail!("rename: new name for '{old}' must be a string");
            };
            mapping.push((old.clone(), new.to_string()));
        }
        if mapping.is_empty() {
            bail!("rename: 'mapping' cannot be empty");
        }
        Ok(Self { mapping })
    }
}

impl Step for RenameStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let mut df = ctx.data().clone();
        for (old, new) in &self.mapping {
            df.rename(old, new.as_str().into())
                .with_context(|| format!("rename: '{old}' -> '{new}'"))?;
        }
        Ok(StepOutcome::Replaced(df))
    }
}

/// Cast columns to declared dtypes.
///
/// Strict casting fails the step on any unconvertible value; non-strict
/// leaves a null in its place.
pub struct CastStep {
    schema: Vec<(String, DataType)>,
    strict: bool,
}

impl CastStep {
    pub fn from_stage(stage: &StepDefinition) -> Result<Self> {
        let raw = require_map(&stage.config, "cast", "schema")?;
        let mut schema = Vec::with_capacity(raw.len());
        for (column, dtype) in raw {
            let Some(name) = dtype.as_str() else {
                bail!("cast: dtype for '{column}' must be a string");
            };
            let dtype = parse_dtype(name)
                .ok_or_else(|| anyhow::anyhow!("cast: unknown dtype '{name}' for '{column}'"))?;
            schema.push((column.clone(), dtype));
        }
        if schema.is_empty() {
            bail!("cast: 'schema' cannot be empty");
        }
        Ok(Self {
            schema,
            strict: optional_bool(&stage.config, "cast", "strict", true)?,
        })
    }
}

impl Step for CastStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let df = ctx.data();
        let columns: Vec<String> = self.schema.iter().map(|(c, _)| c.clone()).collect();
        require_columns(df, &columns, "cast")?;
        let exprs: Vec<_> = self
            .schema
            .iter()
            .map(|(column, dtype)| {
                if self.strict {
                    col(column.as_str()).strict_cast(dtype.clone())
                } else {
                    col(column.as_str()).cast(dtype.clone())
                }
            })
            .collect();
        let casted = df.clone().lazy().with_columns(exprs).collect()?;
        Ok(StepOutcome::Replaced(casted))
    }
}

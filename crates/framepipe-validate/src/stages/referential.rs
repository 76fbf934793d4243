//! Referential validation stage: values must exist in a reference dataset.

use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use framepipe_core::data_utils::{column_value_string, is_missing_value};
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::{Finding, Judgment, StepConfig, StepDefinition};

use crate::check_registry::CheckRegistry;

struct ReferenceRule {
    column: String,
    reference_dataset: String,
    reference_column: String,
}

/// Validates foreign-key style relationships against auxiliary datasets.
///
/// For each rule the stage collects the reference column's values and hands
/// them to the registered `exists_in` check as its allowed set.
pub struct ReferentialStep {
    rules: Vec<ReferenceRule>,
    checks: Arc<CheckRegistry>,
}

impl ReferentialStep {
    pub fn from_stage(stage: &StepDefinition, checks: Arc<CheckRegistry>) -> Result<Self> {
        let Some(Value::Array(raw)) = stage.config.get("rules") else {
            bail!("referential_validation: missing required config 'rules' (a list)");
        };
        if raw.is_empty() {
            bail!("referential_validation: 'rules' cannot be empty");
        }
        let mut rules = Vec::with_capacity(raw.len());
        for entry in raw {
            let Some(entry) = entry.as_object() else {
                bail!("referential_validation: each rule must be an object");
            };
            let field = |key: &str| -> Result<String> {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| anyhow::anyhow!("referential_validation: rule requires '{key}'"))
            };
            rules.push(ReferenceRule {
                column: field("column")?,
                reference_dataset: field("reference_dataset")?,
                reference_column: field("reference_column")?,
            });
        }
        Ok(Self { rules, checks })
    }
}

impl Step for ReferentialStep {
    fn required_datasets(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.rules
            .iter()
            .filter(|rule| seen.insert(rule.reference_dataset.as_str()))
            .map(|rule| rule.reference_dataset.clone())
            .collect()
    }

    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let check = self.checks.get("exists_in")?;
        let df = ctx.data();
        let mut findings = Vec::new();
        let mut failed_rows = BTreeSet::new();

        for rule in &self.rules {
            let reference = ctx.dataset(&rule.reference_dataset)?;
            if reference.column(&rule.reference_column).is_err() {
                bail!(
                    "referential_validation: column '{}' not found in dataset '{}'",
                    rule.reference_column,
                    rule.reference_dataset
                );
            }
            let mut allowed = Vec::new();
            for idx in 0..reference.height() {
                let any = reference
                    .column(&rule.reference_column)?
                    .get(idx)?;
                if !is_missing_value(&any) {
                    allowed.push(Value::String(column_value_string(
                        reference,
                        &rule.reference_column,
                        idx,
                    )));
                }
            }
            let mut params = StepConfig::new();
            params.insert("allowed".to_string(), Value::Array(allowed));

            let outcome = check.check_column(df, &rule.column, &params)?;
            if outcome.passed {
                continue;
            }
            failed_rows.extend(outcome.row_indices.iter().copied());
            let message = outcome.message.unwrap_or_else(|| {
                format!(
                    "column '{}' has values missing from '{}.{}'",
                    rule.column, rule.reference_dataset, rule.reference_column
                )
            });
            findings.push(
                Finding::error("exists_in", message)
                    .with_column(&rule.column)
                    .with_rows(outcome.row_indices)
                    .with_failure_values(outcome.failure_values),
            );
        }
        Ok(StepOutcome::Judged(Judgment::new(
            findings,
            failed_rows.len() as u64,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_builtin_checks;
    use polars::prelude::*;
    use serde_json::json;

    fn checks() -> Arc<CheckRegistry> {
        let mut registry = CheckRegistry::new();
        register_builtin_checks(&mut registry, false).unwrap();
        Arc::new(registry)
    }

    fn stage() -> StepDefinition {
        StepDefinition::new("test", "referential_validation").with_config(
            serde_json::from_value(json!({"rules": [{
                "column": "site",
                "reference_dataset": "sites",
                "reference_column": "id",
            }]}))
            .unwrap(),
        )
    }

    #[test]
    fn flags_values_absent_from_the_reference() {
        let data = df!("site" => ["s1", "s9", "s2"]).unwrap();
        let sites = df!("id" => ["s1", "s2"]).unwrap();
        let ctx = ExecutionContext::new("test", data).with_dataset("sites", sites);
        let step = ReferentialStep::from_stage(&stage(), checks()).unwrap();
        assert_eq!(step.required_datasets(), vec!["sites".to_string()]);
        let StepOutcome::Judged(judgment) = step.execute(&ctx).unwrap() else {
            panic!("expected a judgment");
        };
        assert_eq!(judgment.rows_failed, 1);
        assert_eq!(judgment.findings[0].failure_values, vec!["s9".to_string()]);
    }

    #[test]
    fn missing_reference_dataset_is_an_execution_error() {
        let data = df!("site" => ["s1"]).unwrap();
        let ctx = ExecutionContext::new("test", data);
        let step = ReferentialStep::from_stage(&stage(), checks()).unwrap();
        let err = step.execute(&ctx).err().unwrap();
        assert!(err.to_string().contains("dataset 'sites' not found"));
    }
}

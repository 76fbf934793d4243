//! Cross-field validation stage: every rule spans multiple columns.

use anyhow::{Result, bail};
use std::collections::BTreeSet;
use std::sync::Arc;

use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::{Judgment, Severity, StepDefinition};

use crate::check_registry::CheckRegistry;
use crate::stages::custom_rules::{Rule, RuleTarget};

/// Like `custom_rules`, but restricted to checks relating columns to each
/// other, so a rule must name its `columns`.
pub struct CrossFieldStep {
    rules: Vec<Rule>,
    checks: Arc<CheckRegistry>,
}

impl CrossFieldStep {
    pub fn from_stage(stage: &StepDefinition, checks: Arc<CheckRegistry>) -> Result<Self> {
        let rules = Rule::parse_all("cross_field_validation", &stage.config)?;
        for rule in &rules {
            if !matches!(rule.target, RuleTarget::Columns(_)) {
                bail!(
                    "cross_field_validation: rule '{}' must name 'columns'",
                    rule.check
                );
            }
        }
        Ok(Self { rules, checks })
    }
}

impl Step for CrossFieldStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let mut findings = Vec::new();
        let mut failed_rows = BTreeSet::new();
        for rule in &self.rules {
            if let Some(finding) = rule.apply(&self.checks, ctx)? {
                if finding.severity == Severity::Error {
                    failed_rows.extend(finding.row_indices.iter().copied());
                }
                findings.push(finding);
            }
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

    fn stage(config: serde_json::Value) -> StepDefinition {
        StepDefinition::new("test", "cross_field_validation")
            .with_config(serde_json::from_value(config).unwrap())
    }

    #[test]
    fn date_order_rule_flags_inverted_ranges() {
        let df = df!(
            "start" => ["2026-03-01", "2026-01-01"],
            "end" => ["2026-02-01", "2026-04-01"],
        )
        .unwrap();
        let ctx = ExecutionContext::new("test", df);
        let step = CrossFieldStep::from_stage(
            &stage(json!({"rules": [
                {"check": "date_order", "columns": ["start", "end"]},
            ]})),
            checks(),
        )
        .unwrap();
        let StepOutcome::Judged(judgment) = step.execute(&ctx).unwrap() else {
            panic!("expected a judgment");
        };
        assert_eq!(judgment.error_count(), 1);
        assert_eq!(judgment.rows_failed, 1);
        assert_eq!(judgment.findings[0].row_indices, vec![0]);
    }

    #[test]
    fn single_column_rules_are_rejected() {
        let err = CrossFieldStep::from_stage(
            &stage(json!({"rules": [{"check": "non_empty", "column": "a"}]})),
            checks(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("must name 'columns'"));
    }
}

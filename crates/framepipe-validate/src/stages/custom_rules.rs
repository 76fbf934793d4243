//! Rule-driven validation stage dispatching through the check registry.

use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use framepipe_core::config::optional_bool;
use framepipe_core::{ExecutionContext, Step, StepOutcome};
use framepipe_model::{Finding, Judgment, StepConfig, StepDefinition};

use crate::check::CheckOutcome;
use crate::check_registry::CheckRegistry;

pub(crate) enum RuleTarget {
    Column(String),
    Columns(Vec<String>),
    Frame,
}

pub(crate) struct Rule {
    pub check: String,
    pub target: RuleTarget,
    pub params: StepConfig,
    pub error_message: Option<String>,
    pub raise_warning: bool,
}

impl Rule {
    pub(crate) fn parse(step_type: &str, raw: &Value) -> Result<Self> {
        let Some(entry) = raw.as_object() else {
            bail!("{step_type}: each rule must be an object");
        };
        let Some(check) = entry.get("check").and_then(Value::as_str) else {
            bail!("{step_type}: rule requires a 'check' name");
        };
        let target = match (entry.get("column"), entry.get("columns")) {
            (Some(Value::String(column)), None) => RuleTarget::Column(column.clone()),
            (None, Some(Value::Array(items))) => {
                let columns: Option<Vec<String>> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect();
                let Some(columns) = columns else {
                    bail!("{step_type}: 'columns' must be a list of strings");
                };
                RuleTarget::Columns(columns)
            }
            (None, None) => RuleTarget::Frame,
            _ => bail!("{step_type}: rule takes 'column' or 'columns', not both"),
        };
        let params = match entry.get("params") {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Some(Value::Null) | None => StepConfig::new(),
            Some(_) => bail!("{step_type}: 'params' must be an object"),
        };
        Ok(Self {
            check: check.to_string(),
            target,
            params,
            error_message: entry
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string),
            raise_warning: entry
                .get("raise_warning")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    pub(crate) fn parse_all(
        step_type: &str,
        config: &StepConfig,
    ) -> Result<Vec<Self>> {
        let Some(Value::Array(raw)) = config.get("rules") else {
            bail!("{step_type}: missing required config 'rules' (a list)");
        };
        if raw.is_empty() {
            bail!("{step_type}: 'rules' cannot be empty");
        }
        raw.iter().map(|rule| Self::parse(step_type, rule)).collect()
    }

    /// Dispatch to the matching entry point and shape the outcome into a
    /// finding, or `None` on a pass.
    pub(crate) fn apply(
        &self,
        checks: &CheckRegistry,
        ctx: &ExecutionContext,
    ) -> Result<Option<Finding>> {
        let check = checks.get(&self.check)?;
        let params = checks.merged_params(&self.check, &self.params)?;
        let df = ctx.data();
        let outcome: CheckOutcome = match &self.target {
            RuleTarget::Column(column) => check.check_column(df, column, &params)?,
            RuleTarget::Columns(columns) => check.check_columns(df, columns, &params)?,
            RuleTarget::Frame => check.check_frame(df, &params)?,
        };
        if outcome.passed {
            return Ok(None);
        }
        let message = self
            .error_message
            .clone()
            .or(outcome.message)
            .unwrap_or_else(|| format!("check '{}' failed", self.check));
        let mut finding = if self.raise_warning {
            Finding::warning(&self.check, message)
        } else {
            Finding::error(&self.check, message)
        };
        if let RuleTarget::Column(column) = &self.target {
            finding = finding.with_column(column);
        }
        Ok(Some(
            finding
                .with_rows(outcome.row_indices)
                .with_failure_values(outcome.failure_values),
        ))
    }
}

/// Runs a list of configured rules and aggregates their findings into one
/// judgment.
pub struct CustomRulesStep {
    rules: Vec<Rule>,
    fail_fast: bool,
    checks: Arc<CheckRegistry>,
}

impl CustomRulesStep {
    pub fn from_stage(stage: &StepDefinition, checks: Arc<CheckRegistry>) -> Result<Self> {
        Ok(Self {
            rules: Rule::parse_all("custom_rules", &stage.config)?,
            fail_fast: optional_bool(&stage.config, "custom_rules", "fail_fast", false)?,
            checks,
        })
    }
}

impl Step for CustomRulesStep {
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome> {
        let mut findings = Vec::new();
        let mut failed_rows = BTreeSet::new();
        for rule in &self.rules {
            let Some(finding) = rule.apply(&self.checks, ctx)? else {
                continue;
            };
            let is_error = finding.severity == framepipe_model::Severity::Error;
            if is_error {
                failed_rows.extend(finding.row_indices.iter().copied());
            }
            findings.push(finding);
            if is_error && self.fail_fast {
                break;
            }
        }
        Ok(StepOutcome::Judged(Judgment::new(
            findings,
            failed_rows.len() as u64,
        )))
    }
}

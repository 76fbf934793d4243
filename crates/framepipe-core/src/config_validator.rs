//! Structural validation of pipeline definitions before anything runs.
//!
//! The validator catches the mistakes people actually make in hand-written
//! pipeline configs: misspelled step types, misspelled check names, unknown
//! dtype names, duplicate step names. Where a name is close to a known one
//! it suggests the correction.

use serde_json::Value;
use std::collections::BTreeSet;

use framepipe_model::{OnError, PipelineDefinition, StepDefinition};

use crate::dtype::DTYPE_NAMES;

/// How close a misspelling has to be before we offer a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// The definition cannot run as written.
    Error,
    /// Suspicious but runnable.
    Warning,
}

/// One problem found in a pipeline definition.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    /// Where in the definition, e.g. `stages[2].config.schema.age`.
    pub path: String,
    pub message: String,
    pub severity: IssueSeverity,
}

impl ConfigIssue {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: IssueSeverity::Error,
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            severity: IssueSeverity::Warning,
        }
    }
}

/// Validates pipeline definitions against the registered step and check
/// vocabularies.
pub struct ConfigValidator {
    known_step_types: Vec<String>,
    known_checks: BTreeSet<String>,
}

impl ConfigValidator {
    pub fn new(known_step_types: Vec<String>) -> Self {
        Self {
            known_step_types,
            known_checks: BTreeSet::new(),
        }
    }

    /// Teach the validator the check names accepted by judging stages.
    pub fn with_known_checks(mut self, checks: impl IntoIterator<Item = String>) -> Self {
        self.known_checks.extend(checks);
        self
    }

    /// Every issue found, errors and warnings together, in definition order.
    pub fn validate(&self, definition: &PipelineDefinition) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if definition.stages.is_empty() {
            issues.push(ConfigIssue::error(
                "stages",
                "pipeline must have at least one stage",
            ));
        }

        let mut seen_names = BTreeSet::new();
        for (index, stage) in definition.stages.iter().enumerate() {
            let path = format!("stages[{index}]");
            if !seen_names.insert(stage.name.as_str()) {
                issues.push(ConfigIssue::error(
                    &path,
                    format!("duplicate step name '{}'", stage.name),
                ));
            }
            self.validate_stage(stage, &path, &mut issues);
        }

        issues
    }

    /// True when `validate` would report no error-severity issues.
    pub fn is_valid(&self, definition: &PipelineDefinition) -> bool {
        self.validate(definition)
            .iter()
            .all(|issue| issue.severity != IssueSeverity::Error)
    }

    fn validate_stage(&self, stage: &StepDefinition, path: &str, issues: &mut Vec<ConfigIssue>) {
        if stage.name.is_empty() {
            issues.push(ConfigIssue::error(
                format!("{path}.name"),
                "step name cannot be empty",
            ));
        }

        // a warning, not an error: step types only have to resolve when the
        // pipeline runs, so types registered after add_pipeline are fine
        if !self.known_step_types.iter().any(|t| t == &stage.step_type) {
            let mut message = format!("unknown step type '{}'", stage.step_type);
            if let Some(suggestion) = closest(&stage.step_type, self.known_step_types.iter()) {
                message.push_str(&format!("; did you mean '{suggestion}'?"));
            }
            issues.push(ConfigIssue::warning(format!("{path}.type"), message));
        }

        if !stage.fallback_output.is_empty() && stage.on_error != Some(OnError::Skip) {
            issues.push(ConfigIssue::warning(
                format!("{path}.fallback_output"),
                "fallback_output only takes effect with on_error = skip",
            ));
        }

        if stage.on_error == Some(OnError::Compensate) {
            issues.push(ConfigIssue::warning(
                format!("{path}.on_error"),
                "on_error = compensate is not implemented; a failure here aborts the run",
            ));
        }

        match stage.step_type.as_str() {
            "schema_validation" => self.validate_schema_stage(stage, path, issues),
            "custom_rules" | "cross_field_validation" => {
                self.validate_rules_stage(stage, path, issues);
            }
            "referential_validation" => {
                self.validate_referential_stage(stage, path, issues);
            }
            _ => {}
        }
    }

    fn validate_schema_stage(
        &self,
        stage: &StepDefinition,
        path: &str,
        issues: &mut Vec<ConfigIssue>,
    ) {
        let Some(schema) = stage.config.get("schema") else {
            issues.push(ConfigIssue::error(
                format!("{path}.config.schema"),
                "'schema_validation' requires a 'schema' object",
            ));
            return;
        };
        let Some(schema) = schema.as_object() else {
            issues.push(ConfigIssue::error(
                format!("{path}.config.schema"),
                "'schema' must map column names to dtype names",
            ));
            return;
        };
        for (column, spec) in schema {
            // a column spec is either a bare dtype name or an object with
            // an optional "dtype" member
            let name = match spec {
                Value::String(name) => name.as_str(),
                Value::Object(map) => match map.get("dtype") {
                    Some(Value::String(name)) => name.as_str(),
                    Some(_) => {
                        issues.push(ConfigIssue::error(
                            format!("{path}.config.schema.{column}"),
                            "dtype must be a string",
                        ));
                        continue;
                    }
                    None => continue,
                },
                _ => {
                    issues.push(ConfigIssue::error(
                        format!("{path}.config.schema.{column}"),
                        "column spec must be a dtype name or an object",
                    ));
                    continue;
                }
            };
            if !DTYPE_NAMES.contains(&name) {
                let mut message = format!("unknown dtype '{name}'");
                if let Some(suggestion) = closest(name, DTYPE_NAMES.iter().copied()) {
                    message.push_str(&format!("; did you mean '{suggestion}'?"));
                }
                issues.push(ConfigIssue::error(
                    format!("{path}.config.schema.{column}"),
                    message,
                ));
            }
        }
    }

    fn validate_referential_stage(
        &self,
        stage: &StepDefinition,
        path: &str,
        issues: &mut Vec<ConfigIssue>,
    ) {
        let Some(rules) = stage.config.get("rules").and_then(Value::as_array) else {
            issues.push(ConfigIssue::error(
                format!("{path}.config.rules"),
                "'referential_validation' requires a 'rules' list",
            ));
            return;
        };
        for (index, rule) in rules.iter().enumerate() {
            let rule_path = format!("{path}.config.rules[{index}]");
            let Some(rule) = rule.as_object() else {
                issues.push(ConfigIssue::error(rule_path, "rule must be an object"));
                continue;
            };
            for key in ["column", "reference_dataset", "reference_column"] {
                if !rule.contains_key(key) {
                    issues.push(ConfigIssue::error(
                        format!("{rule_path}.{key}"),
                        format!("rule requires '{key}'"),
                    ));
                }
            }
        }
    }

    fn validate_rules_stage(
        &self,
        stage: &StepDefinition,
        path: &str,
        issues: &mut Vec<ConfigIssue>,
    ) {
        let Some(rules) = stage.config.get("rules") else {
            issues.push(ConfigIssue::error(
                format!("{path}.config.rules"),
                format!("'{}' requires a 'rules' list", stage.step_type),
            ));
            return;
        };
        let Some(rules) = rules.as_array() else {
            issues.push(ConfigIssue::error(
                format!("{path}.config.rules"),
                "'rules' must be a list",
            ));
            return;
        };
        for (index, rule) in rules.iter().enumerate() {
            let rule_path = format!("{path}.config.rules[{index}]");
            let Some(rule) = rule.as_object() else {
                issues.push(ConfigIssue::error(rule_path, "rule must be an object"));
                continue;
            };
            match rule.get("check").and_then(Value::as_str) {
                Some(check) if !self.known_checks.is_empty() => {
                    if !self.known_checks.contains(check) {
                        let mut message = format!("unknown check '{check}'");
                        if let Some(suggestion) =
                            closest(check, self.known_checks.iter().map(String::as_str))
                        {
                            message.push_str(&format!("; did you mean '{suggestion}'?"));
                        }
                        issues.push(ConfigIssue::error(format!("{rule_path}.check"), message));
                    }
                }
                Some(_) => {}
                None => issues.push(ConfigIssue::error(
                    format!("{rule_path}.check"),
                    "rule requires a 'check' name",
                )),
            }
        }
    }
}

/// Closest known name by normalized edit distance, if close enough.
fn closest<'a, S, I>(candidate: &str, known: I) -> Option<&'a str>
where
    S: AsRef<str> + ?Sized + 'a,
    I: IntoIterator<Item = &'a S>,
{
    known
        .into_iter()
        .map(|name| {
            let name = name.as_ref();
            (strsim::normalized_levenshtein(candidate, name), name)
        })
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> ConfigValidator {
        ConfigValidator::new(vec![
            "select".to_string(),
            "filter".to_string(),
            "schema_validation".to_string(),
            "custom_rules".to_string(),
        ])
        .with_known_checks(["non_empty".to_string(), "pattern".to_string()])
    }

    fn stage(name: &str, step_type: &str, config: Value) -> StepDefinition {
        StepDefinition::new(name, step_type).with_config(serde_json::from_value(config).unwrap())
    }

    #[test]
    fn misspelled_step_type_warns_with_a_suggestion() {
        let definition =
            PipelineDefinition::new(vec![stage("pick", "selct", json!({"columns": ["a"]}))]);
        let issues = validator().validate(&definition);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert!(issues[0].message.contains("did you mean 'select'"));
        assert!(validator().is_valid(&definition));
    }

    #[test]
    fn empty_pipeline_is_an_error() {
        let definition = PipelineDefinition::new(vec![]);
        let issues = validator().validate(&definition);
        assert_eq!(issues[0].severity, IssueSeverity::Error);
        assert!(!validator().is_valid(&definition));
    }

    #[test]
    fn misspelled_check_and_dtype_get_suggestions() {
        let definition = PipelineDefinition::new(vec![
            stage(
                "rules",
                "custom_rules",
                json!({"rules": [{"check": "non_emty", "columns": ["id"]}]}),
            ),
            stage("schema", "schema_validation", json!({"schema": {"age": "Int63"}})),
        ]);
        let issues = validator().validate(&definition);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("did you mean 'non_empty'"));
        assert!(issues[1].message.contains("did you mean 'Int64'"));
    }

    #[test]
    fn duplicate_names_are_errors() {
        let definition = PipelineDefinition::new(vec![
            stage("pick", "select", json!({"columns": ["a"]})),
            stage("pick", "filter", json!({"column": "a", "op": "eq", "value": 1})),
        ]);
        let issues = validator().validate(&definition);
        assert!(issues
            .iter()
            .any(|i| i.message.contains("duplicate step name 'pick'")));
    }

    #[test]
    fn fallback_without_skip_is_a_warning() {
        let mut def_stage = stage("pick", "select", json!({"columns": ["a"]}));
        def_stage
            .fallback_output
            .insert("note".to_string(), json!("defaulted"));
        let definition = PipelineDefinition::new(vec![def_stage]);
        let issues = validator().validate(&definition);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
        assert!(validator().is_valid(&definition));
    }

    #[test]
    fn wildly_wrong_name_gets_no_suggestion() {
        let definition = PipelineDefinition::new(vec![stage("x", "zzzzzz", json!({}))]);
        let issues = validator().validate(&definition);
        assert!(!issues[0].message.contains("did you mean"));
    }
}

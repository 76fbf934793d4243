//! Typed accessors over the open key/value config map attached to a step.
//!
//! Leaf steps read their configuration through these helpers so that missing
//! or mistyped keys produce uniform, step-type-prefixed messages.

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use framepipe_model::StepConfig;

/// Required string value.
pub fn require_str(config: &StepConfig, step_type: &str, key: &str) -> Result<String> {
    match config.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => bail!("{step_type}: '{key}' must be a string, got {}", kind(other)),
        None => bail!("{step_type}: missing required config '{key}'"),
    }
}

/// Required non-empty list of strings.
pub fn require_str_list(config: &StepConfig, step_type: &str, key: &str) -> Result<Vec<String>> {
    match config.get(key) {
        Some(value) => {
            let list = str_list(value)
                .ok_or_else(|| anyhow::anyhow!("{step_type}: '{key}' must be a list of strings"))?;
            if list.is_empty() {
                bail!("{step_type}: '{key}' cannot be empty");
            }
            Ok(list)
        }
        None => bail!("{step_type}: missing required config '{key}'"),
    }
}

/// Required object value.
pub fn require_map<'a>(
    config: &'a StepConfig,
    step_type: &str,
    key: &str,
) -> Result<&'a Map<String, Value>> {
    match config.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => bail!("{step_type}: '{key}' must be an object, got {}", kind(other)),
        None => bail!("{step_type}: missing required config '{key}'"),
    }
}

/// Optional string value; `None` when absent.
pub fn optional_str(config: &StepConfig, step_type: &str, key: &str) -> Result<Option<String>> {
    match config.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => bail!("{step_type}: '{key}' must be a string, got {}", kind(other)),
    }
}

/// Optional list of strings; also accepts a single string for convenience.
pub fn optional_str_list(
    config: &StepConfig,
    step_type: &str,
    key: &str,
) -> Result<Option<Vec<String>>> {
    match config.get(key) {
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(value @ Value::Array(_)) => str_list(value)
            .map(Some)
            .ok_or_else(|| anyhow::anyhow!("{step_type}: '{key}' must be a list of strings")),
        Some(Value::Null) | None => Ok(None),
        Some(other) => bail!(
            "{step_type}: '{key}' must be a string or list of strings, got {}",
            kind(other)
        ),
    }
}

/// Optional boolean with a default.
pub fn optional_bool(config: &StepConfig, step_type: &str, key: &str, default: bool) -> Result<bool> {
    match config.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Ok(default),
        Some(other) => bail!("{step_type}: '{key}' must be a boolean, got {}", kind(other)),
    }
}

/// Optional non-negative integer with a default.
pub fn optional_usize(
    config: &StepConfig,
    step_type: &str,
    key: &str,
    default: usize,
) -> Result<usize> {
    match config.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v as usize)
            .ok_or_else(|| anyhow::anyhow!("{step_type}: '{key}' must be a non-negative integer")),
        Some(Value::Null) | None => Ok(default),
        Some(other) => bail!("{step_type}: '{key}' must be an integer, got {}", kind(other)),
    }
}

/// Optional float; `None` when absent.
pub fn optional_f64(config: &StepConfig, step_type: &str, key: &str) -> Result<Option<f64>> {
    match config.get(key) {
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::Null) | None => Ok(None),
        Some(other) => bail!("{step_type}: '{key}' must be a number, got {}", kind(other)),
    }
}

fn str_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> StepConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn required_list_rejects_empty_and_mixed() {
        let cfg = config(json!({"columns": []}));
        let err = require_str_list(&cfg, "select", "columns").unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));

        let cfg = config(json!({"columns": ["a", 1]}));
        assert!(require_str_list(&cfg, "select", "columns").is_err());
    }

    #[test]
    fn missing_key_names_the_step_type() {
        let cfg = StepConfig::new();
        let err = require_str(&cfg, "join", "dataset").unwrap_err();
        assert_eq!(err.to_string(), "join: missing required config 'dataset'");
    }

    #[test]
    fn optional_accessors_apply_defaults() {
        let cfg = StepConfig::new();
        assert!(optional_bool(&cfg, "cast", "strict", true).unwrap());
        assert_eq!(optional_usize(&cfg, "head", "n", 10).unwrap(), 10);
        assert!(optional_str(&cfg, "join", "suffix").unwrap().is_none());
    }

    #[test]
    fn single_string_promotes_to_list() {
        let cfg = config(json!({"by": "region"}));
        assert_eq!(
            optional_str_list(&cfg, "sort", "by").unwrap().unwrap(),
            vec!["region".to_string()]
        );
    }
}

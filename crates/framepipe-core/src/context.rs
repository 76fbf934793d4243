//! Shared execution state threaded through a pipeline run.

use polars::prelude::DataFrame;
use serde_json::Value;
use std::collections::BTreeMap;

use framepipe_model::{EngineError, StepResult};

/// State shared by every step of one pipeline run.
///
/// The engine owns the context mutably; steps receive it by shared
/// reference and can only read. The result trail is append-only: steps and
/// callers can inspect what ran so far but never rewrite history.
pub struct ExecutionContext {
    pipeline_id: String,
    data: DataFrame,
    datasets: BTreeMap<String, DataFrame>,
    metadata: BTreeMap<String, Value>,
    trail: Vec<StepResult>,
    current_step: String,
}

impl ExecutionContext {
    pub fn new(pipeline_id: impl Into<String>, data: DataFrame) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            data,
            datasets: BTreeMap::new(),
            metadata: BTreeMap::new(),
            trail: Vec::new(),
            current_step: String::new(),
        }
    }

    /// Attach a named auxiliary dataset (a join target, a reference table).
    pub fn with_dataset(mut self, name: impl Into<String>, frame: DataFrame) -> Self {
        self.datasets.insert(name.into(), frame);
        self
    }

    /// Seed a metadata entry before the run starts.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// The working dataset as of the last completed mutating step.
    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    /// Look up an auxiliary dataset by name.
    ///
    /// The error names both the dataset and the step asking for it, so a
    /// typo in a pipeline config points straight at the offending stage.
    pub fn dataset(&self, name: &str) -> Result<&DataFrame, EngineError> {
        self.datasets.get(name).ok_or_else(|| EngineError::DatasetNotFound {
            dataset: name.to_string(),
            step: self.current_step.clone(),
        })
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn metadata_keys(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(String::as_str)
    }

    /// Results of every step recorded so far, in execution order.
    pub fn trail(&self) -> &[StepResult] {
        &self.trail
    }

    pub(crate) fn set_data(&mut self, frame: DataFrame) {
        self.data = frame;
    }

    pub(crate) fn set_current_step(&mut self, name: &str) {
        self.current_step = name.to_string();
    }

    pub(crate) fn record(&mut self, result: StepResult) {
        self.trail.push(result);
    }

    pub(crate) fn merge_metadata(&mut self, entries: &BTreeMap<String, Value>) {
        for (key, value) in entries {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    pub(crate) fn into_parts(self) -> (DataFrame, Vec<StepResult>) {
        (self.data, self.trail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn frame() -> DataFrame {
        df!("id" => ["a", "b"]).unwrap()
    }

    #[test]
    fn missing_dataset_names_the_step() {
        let mut ctx = ExecutionContext::new("p1", frame());
        ctx.set_current_step("join_sites");
        let err = ctx.dataset("sites").unwrap_err();
        assert!(matches!(err, EngineError::DatasetNotFound { .. }));
        let msg = err.to_string();
        assert!(msg.contains("sites"));
        assert!(msg.contains("join_sites"));
    }

    #[test]
    fn metadata_merge_overwrites_existing_keys() {
        let mut ctx =
            ExecutionContext::new("p1", frame()).with_metadata("run", Value::from("first"));
        let mut extra = BTreeMap::new();
        extra.insert("run".to_string(), Value::from("second"));
        extra.insert("note".to_string(), Value::from("fallback"));
        ctx.merge_metadata(&extra);
        assert_eq!(ctx.metadata("run"), Some(&Value::from("second")));
        assert_eq!(ctx.metadata("note"), Some(&Value::from("fallback")));
    }
}

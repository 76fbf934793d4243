//! Pipeline and step definitions as parsed from configuration.
//!
//! The engine consumes already-parsed values; it does not care whether the
//! caller produced them from JSON, YAML, or built them in code. The shapes
//! here mirror the external configuration format:
//!
//! ```json
//! {
//!   "description": "customer enrichment",
//!   "on_failure": "collect_all",
//!   "stages": [
//!     {"name": "pick", "type": "select", "config": {"columns": ["id"]}}
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key/value configuration map attached to a step.
pub type StepConfig = BTreeMap<String, Value>;

/// Per-step error policy, evaluated before the pipeline-level policy.
///
/// Absent (`None` on [`StepDefinition::on_error`]) means the step defers to
/// the pipeline-level [`FailurePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Stop the pipeline at this step.
    #[serde(alias = "fail_fast")]
    Abort,
    /// Record the failure, merge `fallback_output` into the context metadata,
    /// and continue with the next step.
    Skip,
    /// Reserved. Surfaces as a `NotImplementedPolicy` failure, never a no-op.
    Compensate,
}

/// Pipeline-level failure policy: does a failed step end the loop?
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Run every step and report all failures together.
    #[default]
    CollectAll,
    /// Stop at the first failed step.
    #[serde(alias = "stop_on_first_failure")]
    FailFast,
}

/// One configured unit of work within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique name within the pipeline; non-empty.
    pub name: String,
    /// Registry key resolved at execution time, enabling late registration.
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub config: StepConfig,
    /// Per-step policy; absent defers to the pipeline policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
    /// Metadata entries applied when a `skip` step fails.
    #[serde(default, alias = "fallback")]
    pub fallback_output: BTreeMap<String, Value>,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, step_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_type: step_type.into(),
            config: StepConfig::new(),
            on_error: None,
            fallback_output: BTreeMap::new(),
        }
    }

    pub fn with_config(mut self, config: StepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = Some(on_error);
        self
    }
}

/// An ordered pipeline of step definitions plus its failure policy.
///
/// Owned by the engine's pipeline table and never mutated mid-execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(alias = "steps")]
    pub stages: Vec<StepDefinition>,
}

impl PipelineDefinition {
    pub fn new(stages: Vec<StepDefinition>) -> Self {
        Self {
            description: None,
            on_failure: FailurePolicy::default(),
            stages,
        }
    }

    pub fn with_on_failure(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

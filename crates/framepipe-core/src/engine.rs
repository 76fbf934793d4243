//! The pipeline engine: holds named pipeline definitions and a step type
//! registry, and drives the step loop with two-layer failure policy.

use chrono::Utc;
use indexmap::IndexMap;
use polars::prelude::DataFrame;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use framepipe_model::{
    EngineError, FailurePolicy, OnError, PipelineDefinition, Result, StepDefinition, StepResult,
};

use crate::config_validator::{ConfigIssue, ConfigValidator, IssueSeverity};
use crate::context::ExecutionContext;
use crate::registry::StepRegistry;
use crate::result::PipelineResult;
use crate::step::{StepFactory, StepOutcome};

/// Drives pipeline runs.
///
/// Pipelines and step types are registered up front; `run` then executes a
/// named pipeline against a dataset. The engine is the only writer of the
/// context's working dataset and trail.
#[derive(Default)]
pub struct Engine {
    pipelines: IndexMap<String, PipelineDefinition>,
    steps: StepRegistry,
    known_checks: BTreeSet<String>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step type. Fails on a duplicate identifier unless
    /// `overwrite` is set.
    pub fn register_step_type(
        &mut self,
        type_id: impl Into<String>,
        factory: StepFactory,
        overwrite: bool,
    ) -> Result<()> {
        self.steps.register(type_id, factory, overwrite)
    }

    pub fn unregister_step_type(&mut self, type_id: &str) -> Result<()> {
        self.steps.unregister(type_id)
    }

    pub fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    pub fn steps_mut(&mut self) -> &mut StepRegistry {
        &mut self.steps
    }

    /// Teach the config validator the check names judging stages accept.
    pub fn add_known_checks(&mut self, checks: impl IntoIterator<Item = String>) {
        self.known_checks.extend(checks);
    }

    /// Register a pipeline definition under `pipeline_id`.
    ///
    /// The definition is validated eagerly so a structurally broken pipeline
    /// is rejected at registration time. Unknown step types only warn here;
    /// they must resolve when the pipeline runs, so a type registered after
    /// the pipeline is fine.
    pub fn add_pipeline(
        &mut self,
        pipeline_id: impl Into<String>,
        definition: PipelineDefinition,
        overwrite: bool,
    ) -> Result<()> {
        let pipeline_id = pipeline_id.into();
        if !overwrite && self.pipelines.contains_key(&pipeline_id) {
            return Err(EngineError::DuplicateRegistration(format!(
                "pipeline '{pipeline_id}'"
            )));
        }
        self.check_valid(&definition)?;
        self.pipelines.insert(pipeline_id, definition);
        Ok(())
    }

    pub fn remove_pipeline(&mut self, pipeline_id: &str) -> Result<()> {
        self.pipelines
            .shift_remove(pipeline_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::PipelineNotFound(pipeline_id.to_string()))
    }

    pub fn pipeline(&self, pipeline_id: &str) -> Result<&PipelineDefinition> {
        self.pipelines
            .get(pipeline_id)
            .ok_or_else(|| EngineError::PipelineNotFound(pipeline_id.to_string()))
    }

    pub fn list_pipelines(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }

    pub fn list_step_types(&self) -> Vec<&str> {
        self.steps.type_ids()
    }

    /// All issues the validator finds, errors and warnings.
    pub fn validate(&self, definition: &PipelineDefinition) -> Vec<ConfigIssue> {
        self.validator().validate(definition)
    }

    /// Reject a definition whose validation found error-severity issues.
    /// Warnings are logged and tolerated.
    pub fn check_valid(&self, definition: &PipelineDefinition) -> Result<()> {
        let issues = self.validate(definition);
        let mut errors = Vec::new();
        for issue in &issues {
            match issue.severity {
                IssueSeverity::Error => errors.push(format!("{}: {}", issue.path, issue.message)),
                IssueSeverity::Warning => {
                    warn!(path = %issue.path, "{}", issue.message);
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Configuration(errors.join("\n")))
        }
    }

    fn validator(&self) -> ConfigValidator {
        let type_ids = self
            .steps
            .type_ids()
            .iter()
            .map(|s| s.to_string())
            .collect();
        ConfigValidator::new(type_ids).with_known_checks(self.known_checks.iter().cloned())
    }

    /// Run a registered pipeline against `data`.
    pub fn run(&self, pipeline_id: &str, data: DataFrame) -> Result<PipelineResult> {
        self.run_with_context(ExecutionContext::new(pipeline_id, data))
    }

    /// Run against a pre-built context, for callers that need auxiliary
    /// datasets or seeded metadata.
    pub fn run_with_context(&self, mut ctx: ExecutionContext) -> Result<PipelineResult> {
        let pipeline_id = ctx.pipeline_id().to_string();
        let definition = self.pipeline(&pipeline_id)?;
        self.check_valid(definition)?;

        let started_at = Utc::now();
        let start = Instant::now();
        let rows_in = ctx.data().height();
        info!(
            pipeline = %pipeline_id,
            stages = definition.stages.len(),
            rows = rows_in,
            "pipeline run started"
        );

        let mut side_output_substituted = false;
        for stage in &definition.stages {
            ctx.set_current_step(&stage.name);
            let rows_before = ctx.data().height();
            let cols_before = ctx.data().width();
            let step_start = Instant::now();

            let mut result = match self.execute_stage(stage, &ctx) {
                Ok(StepOutcome::Replaced(frame)) => {
                    let mut record = StepResult::succeeded(&stage.name, &stage.step_type);
                    record.rows_out = frame.height();
                    record.columns_out = frame.width();
                    ctx.set_data(frame);
                    record
                }
                Ok(StepOutcome::Judged(judgment)) => {
                    let mut record = StepResult::judged(&stage.name, &stage.step_type, judgment);
                    record.rows_out = rows_before;
                    record.columns_out = cols_before;
                    record
                }
                Ok(StepOutcome::JudgedWithOutput { judgment, output }) => {
                    let mut record = StepResult::judged(&stage.name, &stage.step_type, judgment);
                    record.rows_out = output.height();
                    record.columns_out = output.width();
                    ctx.set_data(output);
                    side_output_substituted = true;
                    record
                }
                Err(message) => StepResult::failed(&stage.name, &stage.step_type, message),
            };
            result.rows_in = rows_before;
            result.columns_in = cols_before;
            result.duration = step_start.elapsed();

            if result.success {
                debug!(
                    step = %stage.name,
                    rows_in = result.rows_in,
                    rows_out = result.rows_out,
                    "step completed"
                );
                ctx.record(result);
                continue;
            }

            let message = result.error_message.clone().unwrap_or_default();
            let stop = match stage.on_error {
                Some(OnError::Abort) => {
                    warn!(step = %stage.name, "step failed, aborting per policy: {message}");
                    true
                }
                Some(OnError::Skip) => {
                    warn!(step = %stage.name, "step failed, skipping per policy: {message}");
                    result.skipped = true;
                    ctx.merge_metadata(&stage.fallback_output);
                    false
                }
                Some(OnError::Compensate) => {
                    result.error_message = Some(format!(
                        "{} (step failed with: {message})",
                        EngineError::NotImplementedPolicy("compensate".to_string())
                    ));
                    warn!(step = %stage.name, "compensate policy is not implemented, aborting");
                    true
                }
                None => match definition.on_failure {
                    FailurePolicy::FailFast => {
                        warn!(step = %stage.name, "step failed, failing fast: {message}");
                        true
                    }
                    FailurePolicy::CollectAll => {
                        warn!(step = %stage.name, "step failed, continuing: {message}");
                        false
                    }
                },
            };
            ctx.record(result);
            if stop {
                break;
            }
        }

        let (data, trail) = ctx.into_parts();
        let success = trail.iter().all(|r| r.success || r.skipped);
        let total_errors = trail.iter().map(StepResult::error_count).sum();
        let total_warnings = trail.iter().map(StepResult::warning_count).sum();
        let error_message = trail
            .iter()
            .find(|r| !r.success && !r.skipped)
            .and_then(|r| r.error_message.clone());
        let rows_out = data.height();
        let duration = start.elapsed();

        info!(
            pipeline = %pipeline_id,
            success,
            steps = trail.len(),
            errors = total_errors,
            warnings = total_warnings,
            ?duration,
            "pipeline run finished"
        );

        Ok(PipelineResult {
            pipeline_id,
            success,
            data: (success || side_output_substituted).then_some(data),
            trail,
            started_at,
            duration,
            rows_in,
            rows_out,
            total_errors,
            total_warnings,
            error_message,
        })
    }

    /// Build, pre-check, and execute one stage; failures come back as the
    /// message to record on the step result.
    fn execute_stage(
        &self,
        stage: &StepDefinition,
        ctx: &ExecutionContext,
    ) -> std::result::Result<StepOutcome, String> {
        let step = self.steps.build(stage).map_err(|err| err.to_string())?;
        if let Some(problem) = step.validate_config() {
            return Err(format!("invalid configuration: {problem}"));
        }
        for name in step.required_datasets() {
            if !ctx.has_dataset(&name) {
                return Err(EngineError::DatasetNotFound {
                    dataset: name,
                    step: stage.name.to_string(),
                }
                .to_string());
            }
        }
        step.execute(ctx).map_err(|err| format!("{err:#}"))
    }
}

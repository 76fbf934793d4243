//! End-to-end engine behavior: policies, trails, registries, validation.

use polars::prelude::*;
use serde_json::json;

use framepipe_core::{
    Engine, EngineError, ExecutionContext, Step, StepOutcome, StepRegistry,
};
use framepipe_model::{
    FailurePolicy, Finding, Judgment, OnError, PipelineDefinition, StepDefinition,
};

fn sample() -> DataFrame {
    df!(
        "id" => ["a", "b", "c"],
        "value" => [1i64, 2, 3],
    )
    .unwrap()
}

/// Adds a constant marker column.
struct StampStep {
    name: String,
}

impl Step for StampStep {
    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
        let stamped = ctx
            .data()
            .clone()
            .lazy()
            .with_columns([lit(1i64).alias(self.name.as_str())])
            .collect()?;
        Ok(StepOutcome::Replaced(stamped))
    }
}

/// Always fails with a fixed message.
struct FailStep;

impl Step for FailStep {
    fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
        anyhow::bail!("boom")
    }
}

/// Judges the dataset without touching it.
struct JudgeStep {
    ok: bool,
}

impl Step for JudgeStep {
    fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
        if self.ok {
            Ok(StepOutcome::Judged(Judgment::valid()))
        } else {
            Ok(StepOutcome::Judged(Judgment::new(
                vec![Finding::error("always_fails", "found a problem")],
                1,
            )))
        }
    }
}

/// Fails unless a metadata key is visible in the context.
struct ProbeStep {
    key: String,
}

impl Step for ProbeStep {
    fn execute(&self, ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
        if ctx.metadata(&self.key).is_none() {
            anyhow::bail!("metadata '{}' not set", self.key);
        }
        Ok(StepOutcome::Judged(Judgment::valid()))
    }
}

/// Declares an auxiliary dataset requirement without using it.
struct NeedsDatasetStep {
    dataset: String,
}

impl Step for NeedsDatasetStep {
    fn required_datasets(&self) -> Vec<String> {
        vec![self.dataset.clone()]
    }

    fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
        Ok(StepOutcome::Judged(Judgment::valid()))
    }
}

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .register_step_type(
            "stamp",
            Box::new(|stage| {
                let name = stage
                    .config
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("stamp")
                    .to_string();
                Ok(Box::new(StampStep { name }) as Box<dyn Step>)
            }),
            false,
        )
        .unwrap();
    engine
        .register_step_type(
            "always_fail",
            Box::new(|_stage| Ok(Box::new(FailStep) as Box<dyn Step>)),
            false,
        )
        .unwrap();
    engine
        .register_step_type(
            "judge",
            Box::new(|stage| {
                let ok = stage
                    .config
                    .get("ok")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true);
                Ok(Box::new(JudgeStep { ok }) as Box<dyn Step>)
            }),
            false,
        )
        .unwrap();
    engine
        .register_step_type(
            "probe_metadata",
            Box::new(|stage| {
                let key = stage
                    .config
                    .get("key")
                    .and_then(|v| v.as_str())
                    .unwrap_or("x")
                    .to_string();
                Ok(Box::new(ProbeStep { key }) as Box<dyn Step>)
            }),
            false,
        )
        .unwrap();
    engine
        .register_step_type(
            "needs_dataset",
            Box::new(|stage| {
                let dataset = stage
                    .config
                    .get("dataset")
                    .and_then(|v| v.as_str())
                    .unwrap_or("aux")
                    .to_string();
                Ok(Box::new(NeedsDatasetStep { dataset }) as Box<dyn Step>)
            }),
            false,
        )
        .unwrap();
    engine
}

fn stage(name: &str, step_type: &str) -> StepDefinition {
    StepDefinition::new(name, step_type)
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn successful_run_returns_data_and_full_trail() {
    init_logging();
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![
                stage("first", "stamp"),
                stage("check", "judge"),
            ]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(result.success);
    assert_eq!(result.trail.len(), 2);
    assert_eq!(result.rows_in, 3);
    assert_eq!(result.rows_out, 3);
    let data = result.data.unwrap();
    assert!(data.column("stamp").is_ok());
}

#[test]
fn fail_fast_truncates_the_trail_and_collect_all_does_not() {
    let stages = || {
        vec![
            stage("ok", "stamp"),
            stage("bad", "always_fail"),
            stage("never", "stamp"),
        ]
    };

    let mut engine = engine();
    engine
        .add_pipeline(
            "fast",
            PipelineDefinition::new(stages()).with_on_failure(FailurePolicy::FailFast),
            false,
        )
        .unwrap();
    engine
        .add_pipeline("collect", PipelineDefinition::new(stages()), false)
        .unwrap();

    let fast = engine.run("fast", sample()).unwrap();
    assert!(!fast.success);
    assert_eq!(fast.trail.len(), 2);
    assert!(fast.data.is_none());
    assert_eq!(fast.error_message.as_deref(), Some("boom"));

    let collected = engine.run("collect", sample()).unwrap();
    assert!(!collected.success);
    assert_eq!(collected.trail.len(), 3);
    assert!(collected.trail[2].success);
}

#[test]
fn skip_policy_merges_fallback_metadata_and_preserves_success() {
    let mut engine = engine();
    let mut skipped = stage("flaky", "always_fail").with_on_error(OnError::Skip);
    skipped
        .fallback_output
        .insert("x".to_string(), json!("fallback"));
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![
                skipped,
                stage("probe", "probe_metadata").with_config(
                    serde_json::from_value(json!({"key": "x"})).unwrap(),
                ),
            ]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(result.success, "skipped failures must not fail the run");
    assert_eq!(result.trail.len(), 2);
    assert!(result.trail[0].skipped);
    assert!(!result.trail[0].success);
    assert!(result.trail[1].success, "probe must see the fallback metadata");
    assert!(result.error_message.is_none());
}

#[test]
fn abort_policy_overrides_collect_all() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![
                stage("bad", "always_fail").with_on_error(OnError::Abort),
                stage("never", "stamp"),
            ]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(!result.success);
    assert_eq!(result.trail.len(), 1);
}

#[test]
fn compensate_policy_surfaces_as_not_implemented() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![
                stage("bad", "always_fail").with_on_error(OnError::Compensate),
                stage("never", "stamp"),
            ]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(!result.success);
    assert_eq!(result.trail.len(), 1);
    let message = result.trail[0].error_message.as_deref().unwrap();
    assert!(message.contains("'compensate' is not implemented"));
    assert!(message.contains("boom"));
}

#[test]
fn judging_steps_do_not_change_the_data() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![stage("check", "judge")]),
            false,
        )
        .unwrap();

    let input = sample();
    let result = engine.run("p", input.clone()).unwrap();
    assert!(result.data.unwrap().equals(&input));
}

#[test]
fn repeated_runs_are_deterministic() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![stage("first", "stamp"), stage("check", "judge")]),
            false,
        )
        .unwrap();

    let first = engine.run("p", sample()).unwrap();
    let second = engine.run("p", sample()).unwrap();
    assert_eq!(first.success, second.success);
    assert_eq!(first.trail.len(), second.trail.len());
    assert!(first.data.unwrap().equals(&second.data.unwrap()));
}

#[test]
fn missing_required_dataset_fails_the_step_with_its_name() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![stage("ref", "needs_dataset")]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(!result.success);
    let message = result.trail[0].error_message.as_deref().unwrap();
    assert!(message.contains("dataset 'aux' not found"));
    assert!(message.contains("'ref'"));

    let ctx = ExecutionContext::new("p", sample()).with_dataset("aux", sample());
    let result = engine.run_with_context(ctx).unwrap();
    assert!(result.success);
}

#[test]
fn unknown_pipeline_and_duplicate_registrations_error() {
    let mut engine = engine();
    assert!(matches!(
        engine.run("ghost", sample()),
        Err(EngineError::PipelineNotFound(_))
    ));

    engine
        .add_pipeline("p", PipelineDefinition::new(vec![stage("s", "stamp")]), false)
        .unwrap();
    assert!(matches!(
        engine.add_pipeline("p", PipelineDefinition::new(vec![stage("s", "stamp")]), false),
        Err(EngineError::DuplicateRegistration(_))
    ));
    assert!(engine
        .add_pipeline("p", PipelineDefinition::new(vec![stage("s", "stamp")]), true)
        .is_ok());

    let mut registry = StepRegistry::new();
    registry
        .register(
            "judge",
            Box::new(|_stage| Ok(Box::new(JudgeStep { ok: true }) as Box<dyn Step>)),
            false,
        )
        .unwrap();
    assert!(matches!(
        registry.register(
            "judge",
            Box::new(|_stage| Ok(Box::new(JudgeStep { ok: true }) as Box<dyn Step>)),
            false,
        ),
        Err(EngineError::DuplicateRegistration(_))
    ));
}

#[test]
fn misspelled_step_type_warns_and_fails_the_step_at_run_time() {
    let mut engine = engine();
    let definition = PipelineDefinition::new(vec![stage("s", "stmp")]);
    let issues = engine.validate(&definition);
    assert!(issues
        .iter()
        .any(|i| i.message.contains("did you mean 'stamp'")));

    engine.add_pipeline("p", definition, false).unwrap();
    let result = engine.run("p", sample()).unwrap();
    assert!(!result.success);
    let message = result.trail[0].error_message.as_deref().unwrap();
    assert!(message.contains("unknown step type 'stmp'"));
}

#[test]
fn step_types_may_be_registered_after_the_pipeline() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![stage("late", "later")]),
            false,
        )
        .unwrap();

    let before = engine.run("p", sample()).unwrap();
    assert!(!before.success);

    engine
        .register_step_type(
            "later",
            Box::new(|_stage| Ok(Box::new(JudgeStep { ok: true }) as Box<dyn Step>)),
            false,
        )
        .unwrap();
    let after = engine.run("p", sample()).unwrap();
    assert!(after.success);
}

#[test]
fn empty_pipeline_is_rejected_at_registration() {
    let mut engine = engine();
    let err = engine
        .add_pipeline("p", PipelineDefinition::new(vec![]), false)
        .unwrap_err();
    let EngineError::Configuration(message) = err else {
        panic!("expected a configuration error");
    };
    assert!(message.contains("at least one stage"));
}

#[test]
fn judged_failure_counts_into_totals() {
    let mut engine = engine();
    engine
        .add_pipeline(
            "p",
            PipelineDefinition::new(vec![stage("check", "judge").with_config(
                serde_json::from_value(json!({"ok": false})).unwrap(),
            )]),
            false,
        )
        .unwrap();

    let result = engine.run("p", sample()).unwrap();
    assert!(!result.success);
    assert_eq!(result.total_errors, 1);
    assert_eq!(result.trail[0].rows_failed, 1);
    assert_eq!(result.error_message.as_deref(), Some("found a problem"));
}

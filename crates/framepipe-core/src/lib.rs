//! Pipeline engine: registries, execution context, and the step loop.
//!
//! A pipeline is a named, ordered list of configured stages. Each stage
//! names a step type registered in a [`StepRegistry`]; the [`Engine`] builds
//! the step, runs it against the shared [`ExecutionContext`], and records a
//! per-step result into the run trail. Failure handling is two-layered:
//! a stage's own `on_error` policy wins, otherwise the pipeline-level
//! `on_failure` policy decides whether the loop continues.
//!
//! Leaf step implementations live in the `framepipe-transform` and
//! `framepipe-validate` crates; this crate only knows the [`Step`] contract.

pub mod config;
pub mod config_validator;
pub mod context;
pub mod data_utils;
pub mod dtype;
pub mod engine;
pub mod registry;
pub mod result;
pub mod step;

pub use config_validator::{ConfigIssue, ConfigValidator, IssueSeverity};
pub use context::ExecutionContext;
pub use engine::Engine;
pub use registry::StepRegistry;
pub use result::PipelineResult;
pub use step::{Step, StepFactory, StepOutcome};

pub use framepipe_model::{
    EngineError, FailurePolicy, Finding, Judgment, OnError, PipelineDefinition, Result, Severity,
    StepConfig, StepDefinition, StepResult,
};

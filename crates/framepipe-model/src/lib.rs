//! Data model for the framepipe orchestration engine.
//!
//! This crate holds the dataframe-agnostic types shared by the engine and its
//! leaf step crates:
//!
//! - **definition**: pipeline/step definitions as parsed from configuration
//! - **finding**: findings and judgments produced by judging steps
//! - **result**: the per-step execution record appended to the run trail
//! - **error**: the engine error taxonomy

pub mod definition;
pub mod error;
pub mod finding;
pub mod result;

pub use definition::{FailurePolicy, OnError, PipelineDefinition, StepConfig, StepDefinition};
pub use error::{EngineError, Result};
pub use finding::{FAILURE_SAMPLE_LIMIT, Finding, Judgment, Severity};
pub use result::StepResult;

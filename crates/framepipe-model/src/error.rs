use thiserror::Error;

/// Errors surfaced by the pipeline engine and its registries.
///
/// Only setup-time problems are returned to the caller as `Err`: resolving a
/// pipeline, building the execution context, or rejecting a configuration.
/// Anything that goes wrong once the step loop is running is captured into a
/// failed step record instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("pipeline '{0}' not found")]
    PipelineNotFound(String),
    #[error("{0} is already registered; pass overwrite to replace it")]
    DuplicateRegistration(String),
    #[error("{0} is not registered")]
    NotRegistered(String),
    #[error("unknown step type '{0}'")]
    UnknownStepType(String),
    #[error("dataset '{dataset}' not found (required by step '{step}')")]
    DatasetNotFound { dataset: String, step: String },
    #[error("invalid configuration:\n{0}")]
    Configuration(String),
    #[error("on_error policy '{0}' is not implemented")]
    NotImplementedPolicy(String),
    #[error("step execution failed: {0}")]
    StepExecution(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

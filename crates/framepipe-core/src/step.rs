//! The polymorphic contract every runnable step implements.

use anyhow::Result;
use polars::prelude::DataFrame;

use framepipe_model::{Judgment, StepDefinition};

use crate::context::ExecutionContext;

/// What a step hands back to the engine after a successful run.
pub enum StepOutcome {
    /// The step transformed the working dataset; this frame replaces it.
    Replaced(DataFrame),
    /// The step examined the working dataset and rendered a verdict
    /// without changing it.
    Judged(Judgment),
    /// A verdict plus a side output (a cleaned copy, dropped rows)
    /// that replaces the working dataset.
    JudgedWithOutput {
        judgment: Judgment,
        output: DataFrame,
    },
}

/// A single unit of pipeline work.
///
/// Implementations are registered under a step type identifier and
/// instantiated per pipeline run from the step's config map. They must be
/// `Send + Sync` so a built pipeline can be shared across threads.
pub trait Step: Send + Sync {
    /// Check the config this step was built from. Returns a human-readable
    /// description of the problem, or `None` when the config is usable.
    ///
    /// The engine calls this before executing the step; a `Some` here
    /// surfaces as a configuration failure for the step, not a panic
    /// mid-execution.
    fn validate_config(&self) -> Option<String> {
        None
    }

    /// Names of auxiliary datasets this step reads from the context,
    /// beyond the working dataset. The engine resolves these up front so
    /// a missing dataset fails with a precise error before execution.
    fn required_datasets(&self) -> Vec<String> {
        Vec::new()
    }

    /// Run the step against the shared context.
    fn execute(&self, ctx: &ExecutionContext) -> Result<StepOutcome>;
}

/// Builds a step instance from its definition.
pub type StepFactory = Box<dyn Fn(&StepDefinition) -> Result<Box<dyn Step>> + Send + Sync>;

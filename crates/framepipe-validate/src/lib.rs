//! Builtin judging steps and the reusable check registry.
//!
//! Judging steps inspect the working dataset and render a
//! [`framepipe_model::Judgment`] instead of reshaping data. The leaf checks
//! they dispatch to are registered in a [`CheckRegistry`] so pipelines can
//! mix builtin and caller-provided checks under one vocabulary.

pub mod check;
pub mod check_registry;
pub mod checks;
pub mod stages;

pub use check::{Check, CheckOutcome};
pub use check_registry::CheckRegistry;
pub use stages::{CrossFieldStep, CustomRulesStep, ReferentialStep, SchemaValidationStep};

use std::sync::Arc;

use framepipe_core::{Step, StepRegistry};
use framepipe_model::{Result, StepConfig, StepDefinition};

use checks::{
    ConditionalRequiredCheck, DateOrderCheck, ExistsInCheck, InRangeCheck, NonEmptyCheck,
    PatternCheck, PositiveNumberCheck, UniqueCombinationCheck,
};

/// Register every builtin check.
pub fn register_builtin_checks(registry: &mut CheckRegistry, overwrite: bool) -> Result<()> {
    let no_params = StepConfig::new;
    registry.register("non_empty", Arc::new(NonEmptyCheck), no_params(), overwrite)?;
    registry.register("pattern", Arc::new(PatternCheck), no_params(), overwrite)?;
    registry.register("in_range", Arc::new(InRangeCheck), no_params(), overwrite)?;
    registry.register(
        "positive_number",
        Arc::new(PositiveNumberCheck),
        no_params(),
        overwrite,
    )?;
    registry.register(
        "unique_combination",
        Arc::new(UniqueCombinationCheck),
        no_params(),
        overwrite,
    )?;
    registry.register(
        "conditional_required",
        Arc::new(ConditionalRequiredCheck),
        no_params(),
        overwrite,
    )?;
    registry.register("date_order", Arc::new(DateOrderCheck), no_params(), overwrite)?;
    registry.register("exists_in", Arc::new(ExistsInCheck), no_params(), overwrite)?;
    Ok(())
}

/// Register every builtin judging step type, wired to the given check
/// registry.
pub fn register_builtin_steps(
    registry: &mut StepRegistry,
    checks: Arc<CheckRegistry>,
    overwrite: bool,
) -> Result<()> {
    registry.register(
        "schema_validation",
        Box::new(|stage: &StepDefinition| {
            Ok(Box::new(SchemaValidationStep::from_stage(stage)?) as Box<dyn Step>)
        }),
        overwrite,
    )?;

    let for_rules = Arc::clone(&checks);
    registry.register(
        "custom_rules",
        Box::new(move |stage: &StepDefinition| {
            Ok(Box::new(CustomRulesStep::from_stage(stage, Arc::clone(&for_rules))?)
                as Box<dyn Step>)
        }),
        overwrite,
    )?;

    let for_cross = Arc::clone(&checks);
    registry.register(
        "cross_field_validation",
        Box::new(move |stage: &StepDefinition| {
            Ok(Box::new(CrossFieldStep::from_stage(stage, Arc::clone(&for_cross))?)
                as Box<dyn Step>)
        }),
        overwrite,
    )?;

    registry.register(
        "referential_validation",
        Box::new(move |stage: &StepDefinition| {
            Ok(Box::new(ReferentialStep::from_stage(stage, Arc::clone(&checks))?)
                as Box<dyn Step>)
        }),
        overwrite,
    )?;
    Ok(())
}

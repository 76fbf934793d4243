//! Builtin dataset-mutating steps for the framepipe engine.
//!
//! Each step type here takes the working dataset, reshapes it, and hands the
//! replacement back to the engine. Judging steps live in
//! `framepipe-validate`; this crate never produces findings.

pub mod aggregate;
pub mod column;
pub mod combine;
pub mod fill;
pub mod reshape;
pub mod row;
mod value;

pub use aggregate::GroupByStep;
pub use column::{CastStep, DropStep, RenameStep, SelectStep};
pub use combine::{ConcatStep, JoinStep};
pub use fill::FillNullStep;
pub use reshape::{ExplodeStep, PivotStep, UnpivotStep};
pub use row::{DropNullsStep, FilterStep, HeadStep, SortStep, TailStep, UniqueStep};

use framepipe_core::{Step, StepRegistry};
use framepipe_model::{Result, StepDefinition};

macro_rules! factory {
    ($step:ty) => {
        Box::new(|stage: &StepDefinition| {
            Ok(Box::new(<$step>::from_stage(stage)?) as Box<dyn Step>)
        })
    };
}

/// Register every builtin mutating step type.
pub fn register_builtin_steps(registry: &mut StepRegistry, overwrite: bool) -> Result<()> {
    registry.register("select", factory!(SelectStep), overwrite)?;
    registry.register("drop", factory!(DropStep), overwrite)?;
    registry.register("rename", factory!(RenameStep), overwrite)?;
    registry.register("cast", factory!(CastStep), overwrite)?;
    registry.register("filter", factory!(FilterStep), overwrite)?;
    registry.register("sort", factory!(SortStep), overwrite)?;
    registry.register("unique", factory!(UniqueStep), overwrite)?;
    registry.register("head", factory!(HeadStep), overwrite)?;
    registry.register("tail", factory!(TailStep), overwrite)?;
    registry.register("drop_nulls", factory!(DropNullsStep), overwrite)?;
    registry.register("fill_null", factory!(FillNullStep), overwrite)?;
    registry.register("join", factory!(JoinStep), overwrite)?;
    registry.register("concat", factory!(ConcatStep), overwrite)?;
    registry.register("group_by", factory!(GroupByStep), overwrite)?;
    registry.register("pivot", factory!(PivotStep), overwrite)?;
    registry.register("unpivot", factory!(UnpivotStep), overwrite)?;
    registry.register("explode", factory!(ExplodeStep), overwrite)?;
    Ok(())
}

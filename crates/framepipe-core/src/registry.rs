//! Step type registry, the dispatch table from type identifiers to factories.

use indexmap::IndexMap;

use framepipe_model::{EngineError, Result, StepDefinition};

use crate::step::{Step, StepFactory};

/// Maps step type identifiers to the factories that build them.
///
/// Registration order is preserved so listings and validator suggestions
/// are deterministic across runs.
#[derive(Default)]
pub struct StepRegistry {
    factories: IndexMap<String, StepFactory>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `type_id`.
    ///
    /// Registering an already-known identifier is rejected unless
    /// `overwrite` is set; a silent replacement would make pipeline
    /// behavior depend on registration order.
    pub fn register(
        &mut self,
        type_id: impl Into<String>,
        factory: StepFactory,
        overwrite: bool,
    ) -> Result<()> {
        let type_id = type_id.into();
        if !overwrite && self.factories.contains_key(&type_id) {
            return Err(EngineError::DuplicateRegistration(format!(
                "step type '{type_id}'"
            )));
        }
        self.factories.insert(type_id, factory);
        Ok(())
    }

    pub fn unregister(&mut self, type_id: &str) -> Result<()> {
        self.factories
            .shift_remove(type_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotRegistered(format!("step type '{type_id}'")))
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.factories.contains_key(type_id)
    }

    /// Build a step for the given stage definition.
    pub fn build(&self, stage: &StepDefinition) -> Result<Box<dyn Step>> {
        let factory = self
            .factories
            .get(&stage.step_type)
            .ok_or_else(|| EngineError::UnknownStepType(stage.step_type.clone()))?;
        factory(stage).map_err(|err| {
            EngineError::StepExecution(format!("building '{}': {err:#}", stage.step_type))
        })
    }

    /// Registered type identifiers in registration order.
    pub fn type_ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::step::StepOutcome;
    use framepipe_model::Judgment;

    struct Noop;

    impl Step for Noop {
        fn execute(&self, _ctx: &ExecutionContext) -> anyhow::Result<StepOutcome> {
            Ok(StepOutcome::Judged(Judgment::valid()))
        }
    }

    fn noop_factory() -> StepFactory {
        Box::new(|_stage| Ok(Box::new(Noop) as Box<dyn Step>))
    }

    #[test]
    fn duplicate_registration_requires_overwrite() {
        let mut registry = StepRegistry::new();
        registry.register("noop", noop_factory(), false).unwrap();
        let err = registry.register("noop", noop_factory(), false).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRegistration(_)));
        registry.register("noop", noop_factory(), true).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_type_is_a_distinct_error() {
        let registry = StepRegistry::new();
        let stage = StepDefinition::new("x", "missing");
        let err = registry.build(&stage).err().unwrap();
        assert!(matches!(err, EngineError::UnknownStepType(_)));
    }

    #[test]
    fn type_ids_preserve_registration_order() {
        let mut registry = StepRegistry::new();
        registry.register("zeta", noop_factory(), false).unwrap();
        registry.register("alpha", noop_factory(), false).unwrap();
        assert_eq!(registry.type_ids(), vec!["zeta", "alpha"]);
        registry.unregister("zeta").unwrap();
        assert_eq!(registry.type_ids(), vec!["alpha"]);
    }
}

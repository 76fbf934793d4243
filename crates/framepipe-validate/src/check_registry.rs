//! Registry of reusable checks, keyed by check identifier.

use indexmap::IndexMap;
use std::sync::Arc;

use framepipe_model::{EngineError, Result, StepConfig};

use crate::check::Check;

struct Entry {
    check: Arc<dyn Check>,
    default_params: StepConfig,
}

/// Maps check identifiers to check implementations plus their default
/// parameters. Rule-level parameters overlay the defaults at dispatch time.
#[derive(Default)]
pub struct CheckRegistry {
    entries: IndexMap<String, Entry>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        check_id: impl Into<String>,
        check: Arc<dyn Check>,
        default_params: StepConfig,
        overwrite: bool,
    ) -> Result<()> {
        let check_id = check_id.into();
        if !overwrite && self.entries.contains_key(&check_id) {
            return Err(EngineError::DuplicateRegistration(format!(
                "check '{check_id}'"
            )));
        }
        self.entries.insert(
            check_id,
            Entry {
                check,
                default_params,
            },
        );
        Ok(())
    }

    pub fn unregister(&mut self, check_id: &str) -> Result<()> {
        self.entries
            .shift_remove(check_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotRegistered(format!("check '{check_id}'")))
    }

    pub fn get(&self, check_id: &str) -> Result<Arc<dyn Check>> {
        self.entries
            .get(check_id)
            .map(|entry| Arc::clone(&entry.check))
            .ok_or_else(|| EngineError::NotRegistered(format!("check '{check_id}'")))
    }

    /// Default parameters overlaid with the rule's own.
    pub fn merged_params(&self, check_id: &str, rule_params: &StepConfig) -> Result<StepConfig> {
        let entry = self
            .entries
            .get(check_id)
            .ok_or_else(|| EngineError::NotRegistered(format!("check '{check_id}'")))?;
        let mut merged = entry.default_params.clone();
        for (key, value) in rule_params {
            merged.insert(key.clone(), value.clone());
        }
        Ok(merged)
    }

    pub fn contains(&self, check_id: &str) -> bool {
        self.entries.contains_key(check_id)
    }

    /// Registered check identifiers in registration order.
    pub fn check_ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

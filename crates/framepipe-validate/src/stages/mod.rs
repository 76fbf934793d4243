//! Judging stage implementations.

mod cross_field;
mod custom_rules;
mod referential;
mod schema;

pub use cross_field::CrossFieldStep;
pub use custom_rules::CustomRulesStep;
pub use referential::ReferentialStep;
pub use schema::SchemaValidationStep;

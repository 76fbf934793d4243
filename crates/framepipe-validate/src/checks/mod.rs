//! Builtin check implementations.

mod relational;
mod value;

pub use relational::{ConditionalRequiredCheck, DateOrderCheck, ExistsInCheck, UniqueCombinationCheck};
pub use value::{InRangeCheck, NonEmptyCheck, PatternCheck, PositiveNumberCheck};

use anyhow::{Result, anyhow};
use polars::prelude::{Column, DataFrame};

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| anyhow!("column '{name}' not found"))
}

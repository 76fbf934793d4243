//! The fixed vocabulary of column type names accepted in configuration.
//!
//! Step configs refer to Polars dtypes by name (`"Int64"`, `"String"`, ...).
//! Both the cast step and schema validation resolve names through
//! [`parse_dtype`]; the ConfigValidator checks declared names against
//! [`DTYPE_NAMES`] so typos are caught before execution.

use polars::prelude::{DataType, TimeUnit};

/// Canonical dtype names, including the accepted aliases.
pub const DTYPE_NAMES: &[&str] = &[
    "Int8", "Int16", "Int32", "Int64", "UInt8", "UInt16", "UInt32", "UInt64", "Float32", "Float64",
    "Boolean", "Bool", "String", "Utf8", "Date", "Datetime", "Time", "Null",
];

/// Resolve a configured dtype name to a Polars [`DataType`].
pub fn parse_dtype(name: &str) -> Option<DataType> {
    let dtype = match name {
        "Int8" => DataType::Int8,
        "Int16" => DataType::Int16,
        "Int32" => DataType::Int32,
        "Int64" => DataType::Int64,
        "UInt8" => DataType::UInt8,
        "UInt16" => DataType::UInt16,
        "UInt32" => DataType::UInt32,
        "UInt64" => DataType::UInt64,
        "Float32" => DataType::Float32,
        "Float64" => DataType::Float64,
        "Boolean" | "Bool" => DataType::Boolean,
        "String" | "Utf8" => DataType::String,
        "Date" => DataType::Date,
        "Datetime" => DataType::Datetime(TimeUnit::Microseconds, None),
        "Time" => DataType::Time,
        "Null" => DataType::Null,
        _ => return None,
    };
    Some(dtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_name_parses() {
        for name in DTYPE_NAMES {
            assert!(parse_dtype(name).is_some(), "dtype '{name}' must parse");
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(parse_dtype("Int63").is_none());
        assert!(parse_dtype("utf8").is_none());
    }
}

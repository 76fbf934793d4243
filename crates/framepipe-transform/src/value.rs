//! Conversions from JSON config values into polars expressions.

use anyhow::{Result, bail};
use polars::prelude::{Expr, lit};
use serde_json::Value;

/// Turn a scalar config value into a literal expression.
///
/// Nulls are rejected; null comparisons go through the dedicated
/// `is_null` / `is_not_null` filter operators instead.
pub(crate) fn scalar_to_lit(value: &Value) -> Result<Expr> {
    match value {
        Value::Bool(b) => Ok(lit(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(lit(i))
            } else if let Some(f) = n.as_f64() {
                Ok(lit(f))
            } else {
                bail!("numeric value {n} is out of range")
            }
        }
        Value::String(s) => Ok(lit(s.clone())),
        Value::Null => bail!("null is not a comparable value; use the is_null operator"),
        Value::Array(_) | Value::Object(_) => {
            bail!("expected a scalar value, got {value}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_convert_and_composites_do_not() {
        assert!(scalar_to_lit(&json!(42)).is_ok());
        assert!(scalar_to_lit(&json!(1.5)).is_ok());
        assert!(scalar_to_lit(&json!("text")).is_ok());
        assert!(scalar_to_lit(&json!(true)).is_ok());
        assert!(scalar_to_lit(&json!(null)).is_err());
        assert!(scalar_to_lit(&json!([1, 2])).is_err());
    }
}

//! DataFrame value extraction helpers shared by leaf steps.

use polars::prelude::{AnyValue, DataFrame};

/// Converts an AnyValue to its display string; null becomes the empty string.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Formats a floating-point number, rendering whole values without a
/// fractional part.
pub fn format_numeric(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Converts an AnyValue to f64, returning None for non-numeric or null values.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => s.trim().parse().ok(),
        AnyValue::StringOwned(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a cell counts as missing: null, or a blank/whitespace string.
pub fn is_missing_value(value: &AnyValue<'_>) -> bool {
    match value {
        AnyValue::Null => true,
        AnyValue::String(s) => s.trim().is_empty(),
        AnyValue::StringOwned(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// String value of one cell; empty string when the column or row is absent.
pub fn column_value_string(df: &DataFrame, column: &str, idx: usize) -> String {
    df.column(column)
        .ok()
        .and_then(|series| series.get(idx).ok())
        .map(any_to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{Column, DataFrame};

    #[test]
    fn missing_detection_covers_blank_strings() {
        assert!(is_missing_value(&AnyValue::Null));
        assert!(is_missing_value(&AnyValue::String("   ")));
        assert!(!is_missing_value(&AnyValue::String("x")));
        assert!(!is_missing_value(&AnyValue::Int64(0)));
    }

    #[test]
    fn numeric_formatting_renders_whole_floats_intact() {
        assert_eq!(format_numeric(1.5), "1.5");
        assert_eq!(format_numeric(2.0), "2");
        assert_eq!(format_numeric(10.0), "10");
        assert_eq!(format_numeric(100.0), "100");
        assert_eq!(any_to_string(AnyValue::Float64(10.0)), "10");
    }

    #[test]
    fn column_value_string_is_total() {
        let df = DataFrame::new(vec![Column::new("a".into(), vec!["x", "y"])]).unwrap();
        assert_eq!(column_value_string(&df, "a", 1), "y");
        assert_eq!(column_value_string(&df, "missing", 0), "");
        assert_eq!(column_value_string(&df, "a", 99), "");
    }
}

//! Numeric conversion helpers centralizing safe casts between JSON numbers and grid indices.

use num_traits::cast::cast;
use serde_json::{Number, Value};

/// Convert a f64 to a grid index, returning `None` for negative, fractional, or non-finite values.
#[must_use]
pub fn f64_to_index(value: f64) -> Option<usize> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return None;
    }
    cast::<f64, usize>(value)
}

/// Convert a usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn index_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Read a JSON value as a grid index. Accepts integers, integral floats and numeric strings.
#[must_use]
pub fn value_as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| cast::<u64, usize>(v))
            .or_else(|| n.as_f64().and_then(f64_to_index)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(f64_to_index),
        _ => None,
    }
}

/// Read a JSON value as a number. Strings are not coerced.
#[must_use]
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Wrap a f64 as a JSON number, falling back to `null` for NaN and infinities.
#[must_use]
pub fn number_value(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

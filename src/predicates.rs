//! Capability tests used while resolving arbitrary values.
use crate::Value;

/// Could `value` carry a `then` member?
pub fn is_object_or_function(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Function(_))
}

pub fn is_function(value: &Value) -> bool {
    matches!(value, Value::Function(_))
}

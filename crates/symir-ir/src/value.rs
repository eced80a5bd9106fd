//! Scalar values carried by records and constants.

use serde::{Deserialize, Serialize};

/// Datatype tokens the core knows how to check. Any other datatype string is
/// accepted as an opaque label and never type-checked.
pub const KNOWN_DATATYPES: [&str; 4] = ["string", "int", "float", "bool"];

/// Default datatype for arguments declared without one.
pub const DEFAULT_DATATYPE: &str = "string";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Whether this value inhabits `datatype`. Unknown datatypes accept anything.
    pub fn fits(&self, datatype: &str) -> bool {
        match normalize_datatype(datatype).as_str() {
            "string" => matches!(self, Value::Str(_)),
            "int" => matches!(self, Value::Int(_)),
            "float" => matches!(self, Value::Int(_) | Value::Float(_)),
            "bool" => matches!(self, Value::Bool(_)),
            _ => true,
        }
    }

    pub fn datatype(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

pub fn normalize_datatype(datatype: &str) -> String {
    datatype.trim().to_ascii_lowercase()
}

pub fn datatypes_match(a: &str, b: &str) -> bool {
    normalize_datatype(a) == normalize_datatype(b)
}

pub fn is_known_datatype(datatype: &str) -> bool {
    KNOWN_DATATYPES.contains(&normalize_datatype(datatype).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_fits_float_but_not_the_reverse() {
        assert!(Value::Int(3).fits("float"));
        assert!(!Value::Float(3.5).fits("int"));
    }

    #[test]
    fn unknown_datatypes_accept_anything() {
        assert!(Value::from("2024-01-01").fits("date"));
        assert!(Value::Bool(true).fits("  Custom "));
    }

    #[test]
    fn untagged_json_keeps_numeric_kinds_apart() {
        let v: Vec<Value> = serde_json::from_str(r#"[2020, 10.5, true, "x"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                Value::Int(2020),
                Value::Float(10.5),
                Value::Bool(true),
                Value::from("x")
            ]
        );
    }
}

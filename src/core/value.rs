use std::fmt;
use crate::core::{Result, ScopeError};

/// A value stored in a scope's data mapping.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Json(_) => "JSON",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                (*i as f64 - f).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
            Self::Json(j) => write!(f, "{}", j),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a stored [`Value`] back to the type a caller asked for.
///
/// `key` is only used to build the mismatch error.
pub trait FromValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_value(key: &str, value: &Value) -> Result<Self>;
}

fn mismatch<T: FromValue>(key: &str, value: &Value) -> ScopeError {
    ScopeError::TypeMismatch {
        key: key.to_string(),
        expected: T::TYPE_NAME,
        found: value.type_name(),
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "BOOLEAN";

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch::<Self>(key, value))
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "INTEGER";

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch::<Self>(key, value))
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "FLOAT";

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch::<Self>(key, value))
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "TEXT";

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch::<Self>(key, value))
    }
}

impl FromValue for serde_json::Value {
    const TYPE_NAME: &'static str = "JSON";

    fn from_value(key: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Json(j) => Ok(j.clone()),
            other => Err(mismatch::<Self>(key, other)),
        }
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "ANY";

    fn from_value(_key: &str, value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widens_to_float() {
        let v = Value::from(3_i64);
        assert_eq!(f64::from_value("n", &v).unwrap(), 3.0);
    }

    #[test]
    fn test_float_does_not_narrow_to_integer() {
        let err = i64::from_value("ratio", &Value::Float(0.5)).unwrap_err();
        assert_eq!(
            err,
            ScopeError::TypeMismatch {
                key: "ratio".to_string(),
                expected: "INTEGER",
                found: "FLOAT",
            }
        );
    }

    #[test]
    fn test_text_mismatch_reports_found_type() {
        let err = String::from_value("flag", &Value::Boolean(true)).unwrap_err();
        assert!(err.to_string().contains("expected TEXT, found BOOLEAN"));
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
    }

    #[test]
    fn test_json_roundtrips_through_from_value() {
        let payload = serde_json::json!({"user": "alice", "roles": ["admin"]});
        let v = Value::from(payload.clone());
        assert_eq!(serde_json::Value::from_value("req", &v).unwrap(), payload);
        assert_eq!(Value::from_value("req", &v).unwrap(), v);
    }
}

//! Scalar property types and the values they hold

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};

/// Declared type of an entity property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Binary,
}

impl ScalarType {
    /// Parse the `type` attribute of a schema `property` element
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "String" => Some(ScalarType::String),
            "Integer" => Some(ScalarType::Integer),
            "Float" => Some(ScalarType::Float),
            "Boolean" => Some(ScalarType::Boolean),
            "Date" => Some(ScalarType::Date),
            "Binary" => Some(ScalarType::Binary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Integer => "Integer",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::Date => "Date",
            ScalarType::Binary => "Binary",
        }
    }

    /// Name of the dynamic value class this type accepts
    ///
    /// Integer, Float and Boolean share the `number` class: any numeric value
    /// may be stored in any of them and is converted when written.
    pub fn value_class(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer | ScalarType::Float | ScalarType::Boolean => "number",
            ScalarType::Date => "date",
            ScalarType::Binary => "binary",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        self.value_class() == value.value_class()
    }

    /// Parse a schema `defaultValue` attribute into a value of this type
    ///
    /// Binary defaults are always `None`. `Err` carries a human-readable reason.
    pub fn parse_default(&self, raw: &str) -> Result<Option<Value>, String> {
        let raw_trimmed = raw.trim();
        match self {
            ScalarType::String => Ok(Some(Value::String(raw.to_string()))),
            ScalarType::Integer => raw_trimmed
                .parse::<i64>()
                .map(|v| Some(Value::Integer(v)))
                .map_err(|e| format!("Invalid Integer default '{}': {}", raw, e)),
            ScalarType::Float => raw_trimmed
                .parse::<f64>()
                .map(|v| Some(Value::Float(v)))
                .map_err(|e| format!("Invalid Float default '{}': {}", raw, e)),
            ScalarType::Boolean => parse_bool(raw_trimmed)
                .map(|v| Some(Value::Boolean(v)))
                .ok_or_else(|| format!("Invalid Boolean default '{}'", raw)),
            ScalarType::Date => parse_date(raw_trimmed)
                .map(|v| Some(Value::Date(v)))
                .ok_or_else(|| format!("Invalid Date default '{}'", raw)),
            ScalarType::Binary => Ok(None),
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A property value; `Option<Value>::None` is the null value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl Value {
    pub fn value_class(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => "number",
            Value::Date(_) => "date",
            Value::Binary(_) => "binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of a number; floats truncate toward zero
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Boolean(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truth value of a number; any non-zero number is true
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Integer(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Date(d) => serializer.serialize_str(&d.to_rfc3339()),
            Value::Binary(b) => serializer.serialize_str(&hex::encode(b)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

/// Parse a boolean literal: true/false, yes/no, 1/0 (case-insensitive)
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Parse a date literal
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` (midnight UTC) and
/// integer epoch seconds.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(raw) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(d.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

//! Conversion between model values and SQLite column values
//!
//! Conversions are directed by the declared property type: booleans are
//! stored as 0/1 and dates as Unix seconds.

use chrono::{DateTime, Utc};
use keel_core::model::{parse_date, PropertyDescription, ScalarType, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::errors::{incompatible_structure, Result};

/// Column value for a property value, unboxed per the declared type
///
/// Numbers are interchangeable between numeric types, so an Integer
/// property may hold a float that is stored truncated.
pub fn to_sql(scalar_type: ScalarType, value: Option<&Value>) -> SqlValue {
    let value = match value {
        Some(v) => v,
        None => return SqlValue::Null,
    };
    let converted = match scalar_type {
        ScalarType::Integer => value.as_i64().map(SqlValue::Integer),
        ScalarType::Float => value.as_f64().map(SqlValue::Real),
        ScalarType::Boolean => value.as_bool().map(|b| SqlValue::Integer(i64::from(b))),
        ScalarType::Date => value.as_date().map(|d| SqlValue::Integer(d.timestamp())),
        ScalarType::String | ScalarType::Binary => None,
    };
    converted.unwrap_or_else(|| match value {
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(d) => SqlValue::Integer(d.timestamp()),
        Value::Binary(bytes) => SqlValue::Blob(bytes.clone()),
    })
}

/// Property value for a column value
///
/// # Errors
/// A stored value that cannot be read as the property's type means the
/// table was created by another model.
pub fn from_sql(property: &PropertyDescription, value: ValueRef<'_>) -> Result<Option<Value>> {
    let incompatible = || incompatible_structure(property.entity(), property.name());

    let converted = match (property.scalar_type(), value) {
        (_, ValueRef::Null) => return Ok(None),
        (ScalarType::String, ValueRef::Text(t)) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
        (ScalarType::Integer, ValueRef::Integer(i)) => Value::Integer(i),
        (ScalarType::Float, ValueRef::Real(f)) => Value::Float(f),
        (ScalarType::Float, ValueRef::Integer(i)) => Value::Float(i as f64),
        (ScalarType::Boolean, ValueRef::Integer(i)) => Value::Boolean(i != 0),
        (ScalarType::Date, ValueRef::Integer(secs)) => {
            Value::Date(DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(incompatible)?)
        }
        (ScalarType::Date, ValueRef::Text(t)) => {
            let raw = std::str::from_utf8(t).map_err(|_| incompatible())?;
            Value::Date(parse_date(raw).ok_or_else(incompatible)?)
        }
        (ScalarType::Binary, ValueRef::Blob(b)) => Value::Binary(b.to_vec()),
        (ScalarType::Binary, ValueRef::Text(t)) => Value::Binary(t.to_vec()),
        _ => return Err(incompatible()),
    };
    Ok(Some(converted))
}

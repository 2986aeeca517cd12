//! Typed field values
//!
//! Absence is modelled outside the enum: a record slot is `Option<Value>`.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Character(String),
    /// Numeric and Float fields
    Numeric(f64),
    Integer(i32),
    Currency(f64),
    Double(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Logical(bool),
    /// Resolved memo text
    Memo(String),
    /// Content of a field whose type tag the engine does not know
    Bytes(Vec<u8>),
}

impl Value {
    /// Text content of character-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Character(s) | Value::Memo(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content of number-like values
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Numeric(n) | Value::Currency(n) | Value::Double(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    /// Variant name, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Character(_) => "character",
            Value::Numeric(_) => "numeric",
            Value::Integer(_) => "integer",
            Value::Currency(_) => "currency",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Logical(_) => "logical",
            Value::Memo(_) => "memo",
            Value::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Character(s) | Value::Memo(s) => f.write_str(s),
            Value::Numeric(n) | Value::Currency(n) | Value::Double(n) => write!(f, "{}", n),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Logical(true) => f.write_str("true"),
            Value::Logical(false) => f.write_str("false"),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Character(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Character(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Numeric(n)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

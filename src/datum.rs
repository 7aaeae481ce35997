//! Database data types and values.
//!
//! This module defines the canonical type system and value representation
//! for the engine. [`Type`] provides type-safe handling of column types, and
//! [`Value`] represents a single typed column value with binary
//! serialization support.

use std::cmp::Ordering;
use std::fmt;

use bytes::{Buf, BufMut};
use chrono::{DateTime, NaiveDate};

/// Output/input template for DATE values.
pub const DATE_TEMPLATE: &str = "%Y-%m-%d";

/// Errors from value serialization/deserialization.
#[derive(Debug)]
pub enum SerializationError {
    /// Buffer ended before the value was fully read.
    UnexpectedEof {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Invalid data format.
    InvalidFormat(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::UnexpectedEof {
                required,
                available,
            } => {
                write!(
                    f,
                    "unexpected end of buffer: need {} bytes, have {}",
                    required, available
                )
            }
            SerializationError::InvalidFormat(msg) => {
                write!(f, "invalid format: {}", msg)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// Returns `SerializationError::UnexpectedEof` if fewer bytes remain.
macro_rules! ensure_remaining {
    ($buf:expr, $required:expr) => {
        if $buf.remaining() < $required {
            return Err(SerializationError::UnexpectedEof {
                required: $required,
                available: $buf.remaining(),
            });
        }
    };
}

/// Column data type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// 4-byte signed integer.
    Int,
    /// Single-precision floating-point.
    Float,
    /// Variable-length string.
    Varchar,
    /// Boolean.
    Bool,
    /// Calendar date, stored as epoch seconds at midnight UTC.
    Date,
}

impl Type {
    /// Returns the SQL display name for this type (e.g., `"INT"`).
    pub const fn display_name(self) -> &'static str {
        match self {
            Type::Int => "INT",
            Type::Float => "FLOAT",
            Type::Varchar => "VARCHAR",
            Type::Bool => "BOOL",
            Type::Date => "DATE",
        }
    }

    /// Returns true for INT and FLOAT.
    pub const fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    /// Whether a value may be stored in a column of this type.
    ///
    /// NULL is accepted by every column; INT values are accepted into FLOAT
    /// columns (widening), but not the reverse.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Type::Int, Value::Int(_)) => true,
            (Type::Float, Value::Float(_) | Value::Int(_)) => true,
            (Type::Varchar, Value::Text(_)) => true,
            (Type::Bool, Value::Boolean(_)) => true,
            (Type::Date, Value::Date(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A single typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 4-byte signed integer.
    Int(i32),
    /// Single-precision float.
    Float(f32),
    /// Variable-length string.
    Text(String),
    /// Boolean.
    Boolean(bool),
    /// Epoch seconds at midnight UTC.
    Date(i64),
    /// The NULL sentinel.
    Null,
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type of this value, or `None` for NULL.
    pub fn type_of(&self) -> Option<Type> {
        match self {
            Value::Int(_) => Some(Type::Int),
            Value::Float(_) => Some(Type::Float),
            Value::Text(_) => Some(Type::Varchar),
            Value::Boolean(_) => Some(Type::Bool),
            Value::Date(_) => Some(Type::Date),
            Value::Null => None,
        }
    }

    /// Short type name for diagnostics ("NULL" for the sentinel).
    pub fn type_name(&self) -> &'static str {
        match self.type_of() {
            Some(t) => t.display_name(),
            None => "NULL",
        }
    }

    /// Converts this value into the stored representation for a column of
    /// `ty`, widening INT to FLOAT where needed.
    ///
    /// Returns `None` when the value is not storable in the column
    /// (see [`Type::accepts`]).
    pub fn coerce_to(self, ty: Type) -> Option<Value> {
        match (ty, self) {
            (_, Value::Null) => Some(Value::Null),
            (Type::Int, v @ Value::Int(_)) => Some(v),
            (Type::Float, v @ Value::Float(_)) => Some(v),
            (Type::Float, Value::Int(n)) => Some(Value::Float(n as f32)),
            (Type::Varchar, v @ Value::Text(_)) => Some(v),
            (Type::Bool, v @ Value::Boolean(_)) => Some(v),
            (Type::Date, v @ Value::Date(_)) => Some(v),
            _ => None,
        }
    }

    /// Compares two values, promoting INT against FLOAT.
    ///
    /// Returns `None` when either side is NULL or the types are not
    /// comparable. Floats compare by total order so that index keys and
    /// predicate evaluation agree.
    pub fn try_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Int(a), Value::Float(b)) => Some((*a as f32).total_cmp(b)),
            (Value::Float(a), Value::Int(b)) => Some(a.total_cmp(&(*b as f32))),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Parses a DATE value from the fixed [`DATE_TEMPLATE`] form.
    pub fn date_from_str(s: &str) -> Result<Value, SerializationError> {
        let date = NaiveDate::parse_from_str(s, DATE_TEMPLATE)
            .map_err(|e| SerializationError::InvalidFormat(format!("bad date `{}`: {}", s, e)))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| SerializationError::InvalidFormat(format!("bad date `{}`", s)))?;
        Ok(Value::Date(midnight.and_utc().timestamp()))
    }

    /// Returns the encoded size of this value in bytes.
    ///
    /// NULL encodes to zero bytes; its absence is recorded in the record's
    /// null bitmap.
    pub fn encoded_len(&self) -> usize {
        match self {
            Value::Int(_) => 4,
            Value::Float(_) => 4,
            Value::Text(s) => 2 + s.len(),
            Value::Boolean(_) => 1,
            Value::Date(_) => 8,
            Value::Null => 0,
        }
    }

    /// Appends the binary encoding of this value to `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Value::Int(n) => buf.put_i32_le(*n),
            Value::Float(x) => buf.put_f32_le(*x),
            Value::Text(s) => {
                buf.put_u16_le(s.len() as u16);
                buf.put_slice(s.as_bytes());
            }
            Value::Boolean(b) => buf.put_u8(*b as u8),
            Value::Date(secs) => buf.put_i64_le(*secs),
            Value::Null => {}
        }
    }

    /// Decodes a value of type `ty` from the front of `buf`.
    pub fn decode(buf: &mut impl Buf, ty: Type) -> Result<Value, SerializationError> {
        match ty {
            Type::Int => {
                ensure_remaining!(buf, 4);
                Ok(Value::Int(buf.get_i32_le()))
            }
            Type::Float => {
                ensure_remaining!(buf, 4);
                Ok(Value::Float(buf.get_f32_le()))
            }
            Type::Varchar => {
                ensure_remaining!(buf, 2);
                let len = buf.get_u16_le() as usize;
                ensure_remaining!(buf, len);
                let mut bytes = vec![0u8; len];
                buf.copy_to_slice(&mut bytes);
                let s = String::from_utf8(bytes)
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Ok(Value::Text(s))
            }
            Type::Bool => {
                ensure_remaining!(buf, 1);
                Ok(Value::Boolean(buf.get_u8() != 0))
            }
            Type::Date => {
                ensure_remaining!(buf, 8);
                Ok(Value::Date(buf.get_i64_le()))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// The output form used by SELECT: ints decimal, floats in default decimal
/// form, strings raw, booleans `TRUE`/`FALSE`, dates via [`DATE_TEMPLATE`],
/// NULL as the literal `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Value::Date(secs) => match DateTime::from_timestamp(*secs, 0) {
                Some(dt) => write!(f, "{}", dt.format(DATE_TEMPLATE)),
                None => f.write_str("NULL"),
            },
            Value::Null => f.write_str("NULL"),
        }
    }
}

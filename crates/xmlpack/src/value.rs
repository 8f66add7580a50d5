//! # Value Model
//!
//! The tagged union of everything XML-RPC can carry.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::Error;
use crate::Result;

/// A single XML-RPC value.
///
/// Struct members are kept in a `BTreeMap`: member order carries no meaning on
/// the wire, and a sorted map keeps encoded documents deterministic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(String),
    /// `dateTime.iso8601`, always timezone-naive.
    DateTime(NaiveDateTime),
    /// `base64`
    Binary(Vec<u8>),
    /// The `<nil/>` extension. Only valid when `allow_none` is enabled.
    Nil,
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// The XML-RPC tag name of this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::DateTime(_) => "dateTime.iso8601",
            Self::Binary(_) => "base64",
            Self::Nil => "nil",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
        }
    }

    /// Builds a struct value from `(name, value)` pairs.
    pub fn structure<K, V>(members: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Struct(members.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads a number as a double. Integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Self::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Looks up a struct member. Returns `None` for non-struct values.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.as_struct().and_then(|m| m.get(member))
    }

    /// Converts into a typed Rust value, see [`FromValue`].
    pub fn extract<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

// ============================================================================
//  CONVERSIONS INTO VALUE
// ============================================================================

impl From<i32> for Value {
    fn from(v: i32) -> Self { Self::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Self::Double(v) }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Self::String(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Self::String(v) }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self { Self::DateTime(v) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Self::Binary(v) }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self { Self::Array(v) }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self { Self::Struct(v) }
}

/// A handler that returns nothing answers with nil.
impl From<()> for Value {
    fn from(_: ()) -> Self { Self::Nil }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Nil, Into::into)
    }
}

// ============================================================================
//  CONVERSIONS OUT OF VALUE
// ============================================================================

/// Typed extraction of a `Value`, used to unpack handler arguments.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T> {
    Err(Error::TypeMismatch { expected, found: found.type_name() })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> { Ok(value) }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(v) => Ok(v),
            other => mismatch("int", &other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        value.as_f64().map_or_else(|| mismatch("double", &value), Ok)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => mismatch("boolean", &other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            other => mismatch("string", &other),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::DateTime(v) => Ok(v),
            other => mismatch("dateTime.iso8601", &other),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Binary(v) => Ok(v),
            other => mismatch("base64", &other),
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(v) => Ok(v),
            other => mismatch("array", &other),
        }
    }
}

impl FromValue for BTreeMap<String, Value> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Struct(v) => Ok(v),
            other => mismatch("struct", &other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

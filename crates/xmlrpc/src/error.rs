//! # Error Definitions
//!
//! Codec failures and the application-level `Fault`.

use std::collections::BTreeMap;

use xmlpack::Value;

/// Failures of the wire codec itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A parameter or return value cannot be represented on the wire.
    Encoding(xmlpack::Error),
    /// An incoming `<methodCall>` could not be parsed.
    MalformedRequest(String),
    /// An incoming `<methodResponse>` could not be parsed.
    MalformedResponse(String),
}

impl Error {
    /// A stable name for this error's kind, used when it is reported inside a fault.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "EncodingError",
            Self::MalformedRequest(_) => "MalformedRequestError",
            Self::MalformedResponse(_) => "MalformedResponseError",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encoding(e) => write!(f, "{}", e),
            Self::MalformedRequest(msg) => write!(f, "malformed request: {}", msg),
            Self::MalformedResponse(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encoding(e) => Some(e),
            _ => None,
        }
    }
}

impl From<xmlpack::Error> for Error {
    fn from(e: xmlpack::Error) -> Self { Self::Encoding(e) }
}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An application-level error returned by the remote side in place of a result.
///
/// This is distinct from `Error`: a fault is a well-formed answer, whereas
/// `Error` means the exchange itself failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// The `{faultCode, faultString}` struct carried on the wire.
    pub fn to_value(&self) -> Value {
        let mut members = BTreeMap::new();
        members.insert("faultCode".to_string(), Value::Int(self.code));
        members.insert("faultString".to_string(), Value::String(self.message.clone()));
        Value::Struct(members)
    }

    /// Reads a fault struct. Both members are required and must be typed correctly.
    pub fn from_value(value: &Value) -> Option<Self> {
        let code = value.get("faultCode")?.as_i32()?;
        let message = value.get("faultString")?.as_str()?;
        Some(Self::new(code, message))
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Fault {}: '{}'>", self.code, self.message)
    }
}

impl std::error::Error for Fault {}

//! # Xmlpack
//!
//! The XML-RPC value model and the `<value>` element codec.
//!
//! ## Philosophy
//!
//! - **Closed Model**: `Value` is the complete set of things XML-RPC can carry.
//!   Anything else has to be converted into a `Value` before it reaches the wire.
//! - **Explicit Nil**: `<nil/>` is an extension. The encoder refuses it unless the
//!   exchange was configured with `allow_none`.
//! - **Bounded**: Both directions are bounded by `MAX_RECURSION_DEPTH` nested containers.
//!
//! ## Layout
//!
//! The encoder writes one `<value>` per line, the same layout the reference
//! marshaller produces, so documents stay byte-comparable across implementations.
//! The decoder is whitespace tolerant and accepts the common type aliases
//! (`i4`, `i8`, untyped string values, namespaced `ex:nil`).

mod decoder;
mod encoder;
mod value;

#[cfg(test)]
mod tests;

pub use decoder::Decoder;
pub use decoder::Token;
pub use encoder::Encoder;
pub use encoder::escape;
pub use value::FromValue;
pub use value::Value;

/// The maximum nesting depth for array and struct values.
pub const MAX_RECURSION_DEPTH: usize = 64;

/// The `dateTime.iso8601` layout, without timezone.
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Xmlpack serialization and deserialization errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A nil value was encoded while `allow_none` is disabled.
    NilNotAllowed,
    /// Containers are nested deeper than `MAX_RECURSION_DEPTH`.
    RecursionLimitExceeded,
    /// The document is not well-formed XML.
    Xml(String),
    /// The document is not valid UTF-8.
    InvalidUtf8,
    /// The document ended in the middle of a value.
    UnexpectedEnd,
    /// A different element (or text) was found where a specific one was required.
    UnexpectedToken { expected: String, found: String },
    /// A `<value>` carried a type tag that XML-RPC does not define.
    UnknownType(String),
    /// A scalar's text could not be parsed as its declared type.
    InvalidScalar { kind: &'static str, text: String },
    /// A value did not have the type a caller asked for.
    TypeMismatch { expected: &'static str, found: &'static str },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilNotAllowed => write!(f, "cannot marshal None unless allow_none is enabled"),
            Self::RecursionLimitExceeded => write!(f, "value nesting exceeds {} levels", MAX_RECURSION_DEPTH),
            Self::Xml(msg) => write!(f, "malformed XML: {}", msg),
            Self::InvalidUtf8 => write!(f, "document is not valid UTF-8"),
            Self::UnexpectedEnd => write!(f, "unexpected end of document"),
            Self::UnexpectedToken { expected, found } => write!(f, "expected {}, found {}", expected, found),
            Self::UnknownType(tag) => write!(f, "unknown tag {:?}", tag),
            Self::InvalidScalar { kind, text } => write!(f, "bad {} value {:?}", kind, text),
            Self::TypeMismatch { expected, found } => write!(f, "expected {}, found {}", expected, found),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized Result type for xmlpack operations.
pub type Result<T> = std::result::Result<T, Error>;

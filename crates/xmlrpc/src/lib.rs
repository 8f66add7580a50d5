//! # XML-RPC
//!
//! The wire codec: request and response envelopes over `xmlpack` values.
//!
//! ## Architecture
//!
//! - `frame`: `<methodCall>` / `<methodResponse>` encoding and decoding.
//! - `error`: codec errors and the application-level `Fault`.
//!
//! Transport is out of scope. Every function here maps bytes to values and back.

pub mod error;
pub mod frame;


pub use error::Error;
pub use error::Fault;
pub use error::Result;
pub use frame::Encoding;
pub use frame::MethodCall;
pub use frame::MethodResponse;
pub use frame::Options;
pub use frame::decode_call;
pub use frame::decode_response;
pub use frame::encode_call;
pub use frame::encode_fault;
pub use frame::encode_response;

pub use xmlpack::Value;

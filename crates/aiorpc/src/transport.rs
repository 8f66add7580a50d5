//! # Transport Abstraction
//!
//! A minimal, async interface for posting a request body and reading the reply.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about XML-RPC. It posts opaque
//!   documents and hands back status, headers and body text.
//! - **Policy Owner**: Timeouts, retries and connection reuse belong to the transport,
//!   never to the proxy or the codec.
//! - **Cancellable**: Dropping the future returned by `post` abandons the request.

use std::fmt;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;

/// Response headers as `(name, value)` pairs, in the order received.
pub type Headers = Vec<(String, String)>;

/// What came back from the remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, headers: Headers::new(), body: body.into() }
    }
}

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The peer is unreachable or the connection was dropped.
    Connect(String),
    /// The operation timed out before a response was received.
    Timeout,
    /// A response arrived but its body could not be read.
    Body { status: u16, headers: Headers, message: String },
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl TransportError {
    /// Attaches the request url, keeping whatever status and headers were received.
    pub fn into_protocol_error(self, url: &str) -> ProtocolError {
        let message = self.to_string();
        match self {
            Self::Body { status, headers, .. } => ProtocolError::new(url, status, message, headers),
            _ => ProtocolError::new(url, 0, message, Headers::new()),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(msg) => write!(f, "Connection failed: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Body { message, .. } => write!(f, "Failed to read response body: {}", message),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A transport-level failure as seen by the caller of a remote method.
///
/// `status` is `0` and `headers` is empty when no response was ever received.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolError {
    pub url: String,
    pub status: u16,
    pub body: String,
    pub headers: Headers,
}

impl ProtocolError {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>, headers: Headers) -> Self {
        Self { url: url.into(), status, body: body.into(), headers }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<ProtocolError for {}: {} {}>", self.url, self.status, self.body.trim())
    }
}

impl std::error::Error for ProtocolError {}

/// A mechanism to post a request body and receive the reply.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Posts `body` to `url` and waits for the response.
    ///
    /// # invariants
    /// - Must return `Ok` for any response, whatever its status.
    /// - Must return `Err` only if no usable response was received.
    /// - Should not interpret the payload content.
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse>;
}

/// Serves requests from a `Dispatcher` in the same process, without a network.
#[derive(Clone)]
pub struct LoopbackTransport {
    dispatcher: Arc<Dispatcher>,
}

impl LoopbackTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn post(&self, _url: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let reply = self.dispatcher.marshaled_dispatch(&body).await;
        let body = String::from_utf8(reply).map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".into(), "text/xml".into())],
            body,
        })
    }
}

//! # RPC Client
//!
//! `ServerProxy` owns the endpoint, the marshaling options and a transport.
//! `Method` is a named handle on a proxy: building one is free, calling it is
//! exactly one round trip.
//!
//! ```ignore
//! let proxy = ServerProxy::connect("http://localhost:8000/RPC2")?;
//! let version = proxy.method("version").child("info").call(vec![]).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::error;
use url::Url;
use xmlrpc::Encoding;
use xmlrpc::Fault;
use xmlrpc::Options;
use xmlrpc::Value;

use crate::http::BasicAuth;
use crate::http::HttpConfig;
use crate::http::HttpTransport;
use crate::transport::HttpResponse;
use crate::transport::ProtocolError;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    /// The remote method answered with a fault.
    Fault(Fault),
    /// The exchange failed below XML-RPC (status, network).
    Protocol(ProtocolError),
    /// The request could not be encoded or the response could not be decoded.
    Codec(xmlrpc::Error),
    /// The proxy was configured with an unusable uri or setting.
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "{}", fault),
            Self::Protocol(e) => write!(f, "{}", e),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fault(e) => Some(e),
            Self::Protocol(e) => Some(e),
            Self::Codec(e) => Some(e),
            Self::Config(_) => None,
        }
    }
}

impl From<Fault> for Error {
    fn from(e: Fault) -> Self {
        Self::Fault(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<xmlrpc::Error> for Error {
    fn from(e: xmlrpc::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client-side settings.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub options: Options,
    pub http: HttpConfig,
}

/// Fluent builder for `ServerProxy`.
pub struct ServerProxyBuilder {
    uri: String,
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ServerProxyBuilder {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into(), config: ClientConfig::default(), transport: None }
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.options.encoding = encoding;
        self
    }

    pub fn allow_none(mut self, allow_none: bool) -> Self {
        self.config.options.allow_none = allow_none;
        self
    }

    /// Replaces the default request headers.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.config.http.headers = headers.into_iter().collect();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.config.http.auth = Some(BasicAuth { username: username.into(), password });
        self
    }

    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.config.http.verify_tls = verify;
        self
    }

    pub fn use_env_proxy(mut self, enabled: bool) -> Self {
        self.config.http.use_env_proxy = enabled;
        self
    }

    /// Uses `transport` instead of building an `HttpTransport`.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(mut self) -> Result<ServerProxy> {
        let (url, url_auth) = resolve_uri(&self.uri)?;
        if self.config.http.auth.is_none() {
            self.config.http.auth = url_auth;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let http = HttpTransport::new(&self.config.http)
                    .map_err(|e| Error::Config(e.to_string()))?;
                Arc::new(http)
            },
        };

        Ok(ServerProxy {
            inner: Arc::new(Inner { url: url.to_string(), transport, options: self.config.options }),
        })
    }
}

/// Validates the scheme, defaults an empty path to `/RPC2` and lifts
/// `user:password@` credentials out of the url.
fn resolve_uri(uri: &str) -> Result<(Url, Option<BasicAuth>)> {
    let mut url = Url::parse(uri).map_err(|e| Error::Config(format!("invalid uri {:?}: {}", uri, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("unsupported XML-RPC protocol {:?}", url.scheme())));
    }

    // the url crate normalizes a missing path to "/", so look at the raw text
    let has_path = uri.split_once("://").is_some_and(|(_, rest)| rest.contains('/'));
    if !has_path {
        url.set_path("/RPC2");
    }

    let mut auth = None;
    if !url.username().is_empty() {
        auth = Some(BasicAuth {
            username: url.username().to_string(),
            password: url.password().map(str::to_string),
        });
        url.set_username("").map_err(|_| Error::Config(format!("cannot strip credentials from {:?}", uri)))?;
        url.set_password(None).map_err(|_| Error::Config(format!("cannot strip credentials from {:?}", uri)))?;
    }

    Ok((url, auth))
}

struct Inner {
    url: String,
    transport: Arc<dyn Transport>,
    options: Options,
}

/// A handle on a remote XML-RPC endpoint. Cheap to clone.
#[derive(Clone)]
pub struct ServerProxy {
    inner: Arc<Inner>,
}

impl ServerProxy {
    pub fn builder(uri: impl Into<String>) -> ServerProxyBuilder {
        ServerProxyBuilder::new(uri)
    }

    /// A proxy over HTTP with default settings.
    pub fn connect(uri: impl Into<String>) -> Result<Self> {
        Self::builder(uri).build()
    }

    /// A proxy over a caller-supplied transport.
    pub fn with_transport(uri: impl Into<String>, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::builder(uri).transport(transport).build()
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// A handle on the remote method `name`. No I/O happens until it is called.
    pub fn method(&self, name: impl Into<String>) -> Method {
        Method { proxy: self.clone(), name: name.into() }
    }

    /// Calls `method_name` with positional `params` and returns its result.
    ///
    /// Returns `Fault` if the remote method failed, `Protocol` if the exchange
    /// failed, or `Codec` if either document could not be marshaled.
    pub async fn call(&self, method_name: &str, params: Vec<Value>) -> Result<Value> {
        let body = xmlrpc::encode_call(method_name, &params, &self.inner.options)?;
        debug!(url = %self.inner.url, method = method_name, "sending call");

        let response = self.post(body).await?;
        let result = xmlrpc::decode_response(response.body.as_bytes())?.into_value()?;
        result.map_err(Error::Fault)
    }

    async fn post(&self, body: Vec<u8>) -> Result<HttpResponse> {
        let url = &self.inner.url;
        match self.inner.transport.post(url, body).await {
            Ok(response) if response.status == 200 => Ok(response),
            Ok(response) => Err(Error::Protocol(ProtocolError::new(
                url.as_str(),
                response.status,
                response.body,
                response.headers,
            ))),
            Err(e) => {
                error!(url = %url, error = %e, "Unexpected error");
                Err(Error::Protocol(e.into_protocol_error(url)))
            },
        }
    }
}

impl std::fmt::Debug for ServerProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ServerProxy for {}>", self.inner.url)
    }
}

/// A remote method bound to a proxy.
///
/// `child` extends the dotted name: `proxy.method("a").child("b")` targets `a.b`.
#[derive(Clone, Debug)]
pub struct Method {
    proxy: ServerProxy,
    name: String,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child(&self, name: &str) -> Method {
        Method { proxy: self.proxy.clone(), name: format!("{}.{}", self.name, name) }
    }

    pub async fn call(&self, params: Vec<Value>) -> Result<Value> {
        self.proxy.call(&self.name, params).await
    }
}

//! # HTTP Transport
//!
//! `Transport` over `reqwest`. Every call is one `POST` with a `text/xml` body.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;

use crate::transport;
use crate::transport::Headers;
use crate::transport::HttpResponse;
use crate::transport::Transport;
use crate::transport::TransportError;

/// Default time allowed for one round trip.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP basic credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// Connection settings for `HttpTransport`.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Sent with every request. Replaces the defaults entirely when set.
    pub headers: Headers,
    pub timeout: Option<Duration>,
    pub auth: Option<BasicAuth>,
    /// Verify TLS certificates. Only disable against test servers.
    pub verify_tls: bool,
    /// Honor the `HTTP_PROXY` family of environment variables.
    pub use_env_proxy: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            headers: default_headers(),
            timeout: Some(DEFAULT_TIMEOUT),
            auth: None,
            verify_tls: true,
            use_env_proxy: true,
        }
    }
}

fn default_headers() -> Headers {
    vec![
        ("User-Agent".into(), "rust/aiorpc".into()),
        ("Accept".into(), "text/xml".into()),
        ("Content-Type".into(), "text/xml".into()),
    ]
}

/// Posts XML-RPC documents over HTTP(S).
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
    auth: Option<BasicAuth>,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> transport::Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Io(format!("invalid header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Io(format!("invalid header value {:?}: {}", value, e)))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls);
        if !config.use_env_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(|e| TransportError::Io(e.to_string()))?;

        Ok(Self { client, timeout: config.timeout, auth: config.auth.clone() })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> transport::Result<HttpResponse> {
        let mut request = self.client.post(url).body(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, auth.password.as_deref());
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        match response.text().await {
            Ok(body) => Ok(HttpResponse { status, headers, body }),
            Err(e) => Err(TransportError::Body { status, headers, message: e.to_string() }),
        }
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Io(e.to_string())
    }
}

//! Mock transports for testing.
//!
//! These are used internally by the test suite and are not part of the public API.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::transport;
use crate::transport::HttpResponse;
use crate::transport::Transport;
use crate::transport::TransportError;

/// Answers every url with a canned response and records request bodies.
///
/// Urls without a canned response fail as if the host were unreachable.
#[derive(Default)]
pub struct StaticTransport {
    responses: HashMap<String, HttpResponse>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, response: HttpResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// `(url, body)` of every request seen so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for StaticTransport {
    async fn post(&self, url: &str, body: Vec<u8>) -> transport::Result<HttpResponse> {
        let body = String::from_utf8(body).map_err(|e| TransportError::Io(e.to_string()))?;
        self.requests.lock().unwrap().push((url.to_string(), body));
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Connect("[Errno -2] Name or service not known".into()))
    }
}

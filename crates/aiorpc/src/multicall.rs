//! # Client MultiCall
//!
//! Queues calls locally and sends them as one `system.multicall` round trip.
//! Every queued call gets its own result, so one fault does not hide the others.

use xmlrpc::Fault;
use xmlrpc::MethodCall;
use xmlrpc::Value;

use crate::client::Error;
use crate::client::Result;
use crate::client::ServerProxy;

/// Accumulates calls for a single batched request.
pub struct MultiCall {
    proxy: ServerProxy,
    calls: Vec<MethodCall>,
}

impl MultiCall {
    pub fn new(proxy: &ServerProxy) -> Self {
        Self { proxy: proxy.clone(), calls: Vec::new() }
    }

    /// Queues a call to `method_name`.
    pub fn add(&mut self, method_name: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.calls.push(MethodCall::new(method_name, params));
        self
    }

    /// A queueing handle on `name`, extendable with dotted children.
    pub fn method(&mut self, name: impl Into<String>) -> QueuedMethod<'_> {
        QueuedMethod { calls: &mut self.calls, name: name.into() }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Sends every queued call in one request.
    ///
    /// The outer `Result` fails only if the batch as a whole failed. Per-call
    /// faults are reported in the returned results, in queueing order.
    pub async fn call(&self) -> Result<MultiCallResults> {
        let batch = self
            .calls
            .iter()
            .map(|call| {
                Value::structure([
                    ("methodName", Value::from(call.method_name.as_str())),
                    ("params", Value::Array(call.params.clone())),
                ])
            })
            .collect();

        let reply = self.proxy.call("system.multicall", vec![Value::Array(batch)]).await?;
        let Value::Array(entries) = reply else {
            return Err(Error::Codec(xmlrpc::Error::MalformedResponse(format!(
                "multicall returned {} instead of array",
                reply.type_name()
            ))));
        };

        Ok(MultiCallResults { entries: entries.into_iter().map(unpack_entry).collect() })
    }
}

/// `[value]` on success, `{faultCode, faultString}` on failure.
fn unpack_entry(entry: Value) -> Result<Value> {
    match entry {
        Value::Array(items) if !items.is_empty() => Ok(items.into_iter().next().unwrap_or(Value::Nil)),
        Value::Struct(_) => match Fault::from_value(&entry) {
            Some(fault) => Err(Error::Fault(fault)),
            None => Err(unexpected_entry()),
        },
        _ => Err(unexpected_entry()),
    }
}

fn unexpected_entry() -> Error {
    Error::Codec(xmlrpc::Error::MalformedResponse("unexpected type in multicall result".into()))
}

/// A queued method name, extended with `child` and queued with `queue`.
pub struct QueuedMethod<'a> {
    calls: &'a mut Vec<MethodCall>,
    name: String,
}

impl QueuedMethod<'_> {
    pub fn child(self, name: &str) -> Self {
        Self { calls: self.calls, name: format!("{}.{}", self.name, name) }
    }

    pub fn queue(self, params: Vec<Value>) {
        self.calls.push(MethodCall::new(self.name, params));
    }
}

/// Ordered per-call results of a multicall.
#[derive(Debug)]
pub struct MultiCallResults {
    entries: Vec<Result<Value>>,
}

impl MultiCallResults {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Result<Value>> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Result<Value>> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Result<Value>> {
        self.entries
    }
}

impl IntoIterator for MultiCallResults {
    type Item = Result<Value>;
    type IntoIter = std::vec::IntoIter<Result<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

//! # Registered Instances
//!
//! An `Instance` is an object whose attributes are methods or nested objects.
//! Calls such as `dt.now` walk the attribute chain one dotted segment at a time.
//!
//! ## Invariants
//!
//! - Segments starting with `_` are private and never resolve.
//! - Without dotted names, `a.b` is looked up as a single attribute named `a.b`.
//! - An instance with a catch-all (`has_dispatch`) receives every call the
//!   function table did not match, and attribute lookup is skipped.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use xmlrpc::Value;

use crate::handler::AsyncHandler;
use crate::handler::CallError;
use crate::handler::CallResult;
use crate::handler::FromParams;
use crate::handler::Handler;
use crate::handler::SyncHandler;

/// What an attribute lookup can find.
#[derive(Clone)]
pub enum Attribute {
    Method(Arc<dyn Handler>),
    Object(Arc<dyn Instance>),
}

/// An object served by a `Dispatcher`.
#[async_trait::async_trait]
pub trait Instance: Send + Sync + 'static {
    /// Looks up one attribute by name.
    fn attribute(&self, name: &str) -> Option<Attribute>;

    /// Method names reported by `system.listMethods`.
    fn method_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Help text reported by `system.methodHelp`.
    fn method_help(&self, _method: &str) -> Option<String> {
        None
    }

    /// Whether `dispatch` is a catch-all that replaces attribute lookup.
    fn has_dispatch(&self) -> bool {
        false
    }

    async fn dispatch(&self, method: &str, _params: Vec<Value>) -> CallResult {
        Err(CallError::not_found(method))
    }
}

/// Follows `name` through nested instances.
///
/// Returns `None` for private or missing segments, or when an intermediate
/// segment is a method rather than an object.
pub fn resolve_dotted_attribute(
    instance: &Arc<dyn Instance>,
    name: &str,
    allow_dotted_names: bool,
) -> Option<Attribute> {
    let segments: Vec<&str> = if allow_dotted_names { name.split('.').collect() } else { vec![name] };

    let mut current = Attribute::Object(instance.clone());
    for segment in segments {
        if segment.starts_with('_') {
            return None;
        }
        let Attribute::Object(object) = current else {
            return None;
        };
        current = object.attribute(segment)?;
    }
    Some(current)
}

/// Builder-style `Instance` made of named functions and nested namespaces.
///
/// ```ignore
/// let dt = Namespace::new().function("now", |()| Ok(Local::now().naive_local()));
/// let api = Namespace::new().function("get_data", |()| Ok("data")).object("dt", dt);
/// ```
#[derive(Clone, Default)]
pub struct Namespace {
    attributes: BTreeMap<String, Attribute>,
    help: HashMap<String, String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function<F, A, R>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(A) -> Result<R, CallError> + Send + Sync + 'static,
        A: FromParams + Send + 'static,
        R: Into<Value> + Send + 'static,
    {
        self.handler(name, SyncHandler::new(func))
    }

    pub fn async_function<F, A, Fut, R>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: FromParams + Send + 'static,
        Fut: Future<Output = Result<R, CallError>> + Send + 'static,
        R: Into<Value> + Send + 'static,
    {
        self.handler(name, AsyncHandler::new(func))
    }

    pub fn handler(mut self, name: impl Into<String>, handler: impl Handler) -> Self {
        self.attributes.insert(name.into(), Attribute::Method(Arc::new(handler)));
        self
    }

    /// Nests `object` under `name`; reachable only with dotted names allowed.
    pub fn object(mut self, name: impl Into<String>, object: impl Instance) -> Self {
        self.attributes.insert(name.into(), Attribute::Object(Arc::new(object)));
        self
    }

    pub fn help(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.help.insert(name.into(), text.into());
        self
    }
}

#[async_trait::async_trait]
impl Instance for Namespace {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.get(name).cloned()
    }

    /// Public methods of this namespace, sorted. Nested objects are not listed.
    fn method_names(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(name, attr)| !name.starts_with('_') && matches!(attr, Attribute::Method(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn method_help(&self, method: &str) -> Option<String> {
        self.help.get(method).cloned()
    }
}

//! # Dispatcher
//!
//! Owns the method registry and routes decoded calls to handlers.
//!
//! ## Philosophy
//!
//! - **Register, then serve**: registration takes `&mut self`. Once serving, the
//!   dispatcher sits behind an `Arc` and is only read.
//! - **Faults are answers**: `marshaled_dispatch` always produces a response
//!   document. Malformed requests, unknown methods, handler errors and handler
//!   panics all come back as faults.
//!
//! ## Resolution order
//!
//! 1. Exact match in the function table.
//! 2. The registered instance's catch-all `dispatch`, if it has one.
//! 3. Dotted attribute lookup on the registered instance.
//!
//! Anything else is `method "NAME" is not supported`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;
use tracing::warn;
use xmlrpc::Options;
use xmlrpc::Value;

use crate::handler::AsyncHandler;
use crate::handler::CallError;
use crate::handler::CallResult;
use crate::handler::FromParams;
use crate::handler::Handler;
use crate::handler::SyncHandler;
use crate::instance::Attribute;
use crate::instance::Instance;
use crate::instance::resolve_dotted_attribute;
use crate::system::SystemMethod;

/// A function table slot.
#[derive(Clone)]
pub(crate) enum Entry {
    Handler(Arc<dyn Handler>),
    /// Served by the dispatcher itself, see `system`.
    System(SystemMethod),
}

/// Routes XML-RPC calls to registered functions and an optional instance.
pub struct Dispatcher {
    pub(crate) funcs: HashMap<String, Entry>,
    pub(crate) help: HashMap<String, String>,
    pub(crate) instance: Option<Arc<dyn Instance>>,
    pub(crate) allow_dotted_names: bool,
    options: Options,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// A dispatcher that marshals responses with `options`.
    pub fn with_options(options: Options) -> Self {
        Self {
            funcs: HashMap::new(),
            help: HashMap::new(),
            instance: None,
            allow_dotted_names: false,
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registers a function that answers without suspending.
    ///
    /// ```ignore
    /// dispatcher.register_function("division", |(x, y): (f64, f64)| {
    ///     if y == 0.0 {
    ///         return Err(CallError::new("ZeroDivisionError", "division by zero"));
    ///     }
    ///     Ok(x / y)
    /// });
    /// ```
    pub fn register_function<F, A, R>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(A) -> Result<R, CallError> + Send + Sync + 'static,
        A: FromParams + Send + 'static,
        R: Into<Value> + Send + 'static,
    {
        self.register_handler(name, SyncHandler::new(func))
    }

    /// Registers a function whose result is awaited. Calls to it may interleave.
    pub fn register_async_function<F, A, Fut, R>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: FromParams + Send + 'static,
        Fut: Future<Output = Result<R, CallError>> + Send + 'static,
        R: Into<Value> + Send + 'static,
    {
        self.register_handler(name, AsyncHandler::new(func))
    }

    /// Registers any `Handler`. A later registration under the same name wins.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: impl Handler) -> &mut Self {
        self.funcs.insert(name.into(), Entry::Handler(Arc::new(handler)));
        self
    }

    /// Sets the text `system.methodHelp` reports for a registered function.
    pub fn set_method_help(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.help.insert(name.into(), text.into());
        self
    }

    /// Serves `instance` for every name the function table does not match.
    ///
    /// Only one instance can be registered; a second call replaces the first.
    /// With `allow_dotted_names`, `a.b.c` walks nested objects. Enabling it on an
    /// instance that exposes more than intended lets callers reach it.
    pub fn register_instance(&mut self, instance: impl Instance, allow_dotted_names: bool) -> &mut Self {
        self.instance = Some(Arc::new(instance));
        self.allow_dotted_names = allow_dotted_names;
        self
    }

    pub(crate) fn register_system(&mut self, name: &str, method: SystemMethod) {
        self.funcs.insert(name.to_string(), Entry::System(method));
    }

    /// Names in the function table, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.funcs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invokes `method` with `params`.
    ///
    /// The future is boxed so `system.multicall` can dispatch recursively.
    /// Panics inside handlers are caught and reported as `Panic` errors.
    pub fn dispatch<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, CallResult> {
        Box::pin(async move {
            debug!(method, params = params.len(), "dispatching call");

            let result = AssertUnwindSafe(self.invoke(method, params))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(CallError::new("Panic", panic_message(panic.as_ref()))));

            match &result {
                Err(e) if e.is_unexpected() => warn!(method, error = %e, "call failed"),
                Err(e) => debug!(method, error = %e, "call answered with a fault"),
                Ok(_) => {},
            }
            result
        })
    }

    async fn invoke(&self, method: &str, params: Vec<Value>) -> CallResult {
        if let Some(entry) = self.funcs.get(method) {
            return match entry {
                Entry::Handler(handler) => handler.invoke(params).await,
                Entry::System(system) => self.dispatch_system(*system, params).await,
            };
        }

        let Some(instance) = &self.instance else {
            return Err(CallError::not_found(method));
        };
        if instance.has_dispatch() {
            return instance.dispatch(method, params).await;
        }

        match resolve_dotted_attribute(instance, method, self.allow_dotted_names) {
            Some(Attribute::Method(handler)) => handler.invoke(params).await,
            Some(Attribute::Object(_)) => Err(CallError::type_error(format!("'{}' object is not callable", method))),
            None => Err(CallError::not_found(method)),
        }
    }

    /// Decodes a request document, dispatches it and encodes the answer.
    ///
    /// Never fails: every error is encoded as a fault response.
    pub async fn marshaled_dispatch(&self, body: &[u8]) -> Vec<u8> {
        let result = match xmlrpc::decode_call(body) {
            Ok(call) => self.dispatch(&call.method_name, call.params).await,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                Err(CallError::from(e))
            },
        };

        let result = result.map_err(CallError::into_fault);
        match xmlrpc::encode_response(&result, &self.options) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "result could not be marshaled");
                xmlrpc::encode_fault(&CallError::from(e).into_fault(), self.options.encoding)
            },
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

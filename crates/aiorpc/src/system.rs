//! # System Methods
//!
//! `system.multicall` and the introspection trio (`system.listMethods`,
//! `system.methodHelp`, `system.methodSignature`). They live in the function
//! table like any other method but are served by the dispatcher itself, so a
//! batched call can dispatch back into the same registry.

use futures::future::join_all;
use tracing::debug;
use xmlrpc::MethodCall;
use xmlrpc::Value;

use crate::dispatcher::Dispatcher;
use crate::handler::CallError;
use crate::handler::CallResult;
use crate::handler::FromParams;

/// Reply of `system.methodSignature`; signatures are never tracked.
pub const SIGNATURES_NOT_SUPPORTED: &str = "signatures not supported";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemMethod {
    Multicall,
    ListMethods,
    MethodHelp,
    MethodSignature,
}

impl Dispatcher {
    /// Registers `system.multicall`.
    pub fn register_multicall_functions(&mut self) -> &mut Self {
        self.register_system("system.multicall", SystemMethod::Multicall);
        self
    }

    /// Registers `system.listMethods`, `system.methodHelp` and `system.methodSignature`.
    pub fn register_introspection_functions(&mut self) -> &mut Self {
        self.register_system("system.listMethods", SystemMethod::ListMethods);
        self.register_system("system.methodHelp", SystemMethod::MethodHelp);
        self.register_system("system.methodSignature", SystemMethod::MethodSignature);
        self
    }

    pub(crate) async fn dispatch_system(&self, method: SystemMethod, params: Vec<Value>) -> CallResult {
        match method {
            SystemMethod::Multicall => {
                let (calls,) = <(Vec<Value>,)>::from_params(params)?;
                self.system_multicall(calls).await.map(Value::Array)
            },
            SystemMethod::ListMethods => {
                <()>::from_params(params)?;
                let names = self.system_list_methods().into_iter().map(Value::from).collect();
                Ok(Value::Array(names))
            },
            SystemMethod::MethodHelp => {
                let (name,) = <(String,)>::from_params(params)?;
                Ok(Value::from(self.system_method_help(&name)))
            },
            SystemMethod::MethodSignature => {
                let (_name,) = <(String,)>::from_params(params)?;
                Ok(Value::from(SIGNATURES_NOT_SUPPORTED))
            },
        }
    }

    /// Runs a batch of calls concurrently.
    ///
    /// Each entry of `calls` must be a struct holding `methodName` and `params`.
    /// Results come back in submission order: `[value]` on success, a fault
    /// struct on failure. An entry that is not a struct or lacks either key
    /// fails the whole batch before anything runs. A wrongly typed member only
    /// faults its own entry.
    pub async fn system_multicall(&self, calls: Vec<Value>) -> Result<Vec<Value>, CallError> {
        let calls = calls.into_iter().map(parse_multicall_entry).collect::<Result<Vec<_>, _>>()?;
        debug!(calls = calls.len(), "running multicall batch");

        let pending = calls.into_iter().map(|call| async move {
            let result = match call {
                Ok(call) => self.dispatch(&call.method_name, call.params).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(value) => Value::Array(vec![value]),
                Err(e) => e.into_fault().to_value(),
            }
        });
        Ok(join_all(pending).await)
    }

    /// Function table names plus whatever the instance lists, sorted and deduplicated.
    pub fn system_list_methods(&self) -> Vec<String> {
        let mut names = self.method_names();
        if let Some(instance) = &self.instance {
            names.extend(instance.method_names());
        }
        names.sort();
        names.dedup();
        names
    }

    /// Help text of `method`, or an empty string when there is none.
    pub fn system_method_help(&self, method: &str) -> String {
        if self.funcs.contains_key(method) {
            return self.help.get(method).cloned().unwrap_or_default();
        }
        self.instance
            .as_ref()
            .and_then(|instance| instance.method_help(method))
            .unwrap_or_default()
    }
}

/// The outer `Result` fails the batch, the inner one only this entry.
fn parse_multicall_entry(entry: Value) -> Result<Result<MethodCall, CallError>, CallError> {
    let Value::Struct(mut members) = entry else {
        return Err(CallError::type_error(format!(
            "multicall entry must be a struct, not {}",
            entry.type_name()
        )));
    };

    let method_name = members.remove("methodName").ok_or_else(|| CallError::new("KeyError", "'methodName'"))?;
    let params = members.remove("params").ok_or_else(|| CallError::new("KeyError", "'params'"))?;

    let call = match (method_name, params) {
        (Value::String(name), Value::Array(params)) => Ok(MethodCall::new(name, params)),
        (Value::String(_), other) => {
            Err(CallError::type_error(format!("params must be an array, not {}", other.type_name())))
        },
        (other, _) => Err(CallError::type_error(format!("methodName must be a string, not {}", other.type_name()))),
    };
    Ok(call)
}

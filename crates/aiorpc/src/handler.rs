//! # Handlers
//!
//! A `Handler` turns positional XML-RPC params into a result. Plain closures are
//! adapted with `SyncHandler` (runs to completion) or `AsyncHandler` (returns a
//! future the dispatcher awaits). The adapter is picked at registration time.
//!
//! ## Invariants
//!
//! - Handler failures are values (`CallError`), never panics. Panics are still
//!   caught by the dispatcher and reported as faults.
//! - Argument unpacking is strict: wrong arity or a wrong type is a `TypeError`.

use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;

use xmlpack::FromValue;
use xmlrpc::Fault;
use xmlrpc::Value;

/// Fault code used for every error that is not an explicit `Fault`.
pub const GENERIC_FAULT_CODE: i32 = 1;

/// Why a call produced no value.
#[derive(Debug, Clone, PartialEq)]
pub enum CallError {
    /// Sent to the caller as-is.
    Fault(Fault),
    /// No function, instance method or catch-all matched the name.
    NotFound(String),
    /// Any other failure, identified by a stable kind name.
    Raised { kind: Cow<'static, str>, message: String },
}

impl CallError {
    pub fn new(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::Raised { kind: kind.into(), message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn not_found(method: impl Into<String>) -> Self {
        Self::NotFound(method.into())
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Fault(_) => "Fault",
            Self::NotFound(_) => "Exception",
            Self::Raised { kind, .. } => kind.as_ref(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Fault(fault) => fault.message.clone(),
            Self::NotFound(method) => format!("method \"{}\" is not supported", method),
            Self::Raised { message, .. } => message.clone(),
        }
    }

    /// Panics and codec failures. Faults, unknown methods and errors raised by
    /// handlers are ordinary answers.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            Self::Raised { kind, .. }
                if matches!(kind.as_ref(), "Panic" | "EncodingError" | "MalformedRequestError" | "MalformedResponseError")
        )
    }

    /// The fault reported to the caller: explicit faults pass through, anything
    /// else becomes code 1 with `"<kind>:<message>"`.
    pub fn into_fault(self) -> Fault {
        match self {
            Self::Fault(fault) => fault,
            other => Fault::new(GENERIC_FAULT_CODE, format!("{}:{}", other.kind(), other.message())),
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fault(fault) => write!(f, "{}", fault),
            other => write!(f, "{}:{}", other.kind(), other.message()),
        }
    }
}

impl std::error::Error for CallError {}

impl From<Fault> for CallError {
    fn from(e: Fault) -> Self {
        Self::Fault(e)
    }
}

impl From<xmlpack::Error> for CallError {
    fn from(e: xmlpack::Error) -> Self {
        Self::type_error(e.to_string())
    }
}

impl From<xmlrpc::Error> for CallError {
    fn from(e: xmlrpc::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<anyhow::Error> for CallError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Fault>() {
            Ok(fault) => Self::Fault(fault),
            Err(e) => Self::new("Error", e.to_string()),
        }
    }
}

pub type CallResult = Result<Value, CallError>;

/// Something that can answer a call.
///
/// This trait is designed to be object-safe (`Arc<dyn Handler>`).
#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn invoke(&self, params: Vec<Value>) -> CallResult;
}

// ============================================================================
//  ARGUMENT UNPACKING
// ============================================================================

/// Unpacks positional params into a typed argument list.
///
/// Implemented for `()`, tuples of up to four `FromValue` types, and
/// `Vec<Value>` (takes every param untouched).
pub trait FromParams: Sized {
    fn from_params(params: Vec<Value>) -> Result<Self, CallError>;
}

impl FromParams for Vec<Value> {
    fn from_params(params: Vec<Value>) -> Result<Self, CallError> {
        Ok(params)
    }
}

impl FromParams for () {
    fn from_params(params: Vec<Value>) -> Result<Self, CallError> {
        check_arity(&params, 0)
    }
}

fn check_arity(params: &[Value], expected: usize) -> Result<(), CallError> {
    if params.len() == expected {
        return Ok(());
    }
    let noun = if expected == 1 { "argument" } else { "arguments" };
    Err(CallError::type_error(format!(
        "takes {} positional {} but {} were given",
        expected,
        noun,
        params.len()
    )))
}

fn next_arg<T: FromValue>(args: &mut impl Iterator<Item = (usize, Value)>) -> Result<T, CallError> {
    let Some((index, value)) = args.next() else {
        return Err(CallError::type_error("missing positional argument"));
    };
    T::from_value(value).map_err(|e| CallError::type_error(format!("argument {}: {}", index + 1, e)))
}

macro_rules! impl_from_params {
    ($count:expr; $($arg:ident),+) => {
        impl<$($arg: FromValue),+> FromParams for ($($arg,)+) {
            fn from_params(params: Vec<Value>) -> Result<Self, CallError> {
                check_arity(&params, $count)?;
                let mut args = params.into_iter().enumerate();
                Ok(($(next_arg::<$arg>(&mut args)?,)+))
            }
        }
    };
}

impl_from_params!(1; A);
impl_from_params!(2; A, B);
impl_from_params!(3; A, B, C);
impl_from_params!(4; A, B, C, D);

// ============================================================================
//  ADAPTERS
// ============================================================================

/// Adapts `Fn(Args) -> Result<R, CallError>`. The call completes without suspending.
pub struct SyncHandler<F, A> {
    func: F,
    _args: PhantomData<fn(A)>,
}

impl<F, A> SyncHandler<F, A> {
    pub fn new(func: F) -> Self {
        Self { func, _args: PhantomData }
    }
}

#[async_trait::async_trait]
impl<F, A, R> Handler for SyncHandler<F, A>
where
    F: Fn(A) -> Result<R, CallError> + Send + Sync + 'static,
    A: FromParams + Send + 'static,
    R: Into<Value> + Send + 'static,
{
    async fn invoke(&self, params: Vec<Value>) -> CallResult {
        let args = A::from_params(params)?;
        (self.func)(args).map(Into::into)
    }
}

/// Adapts `Fn(Args) -> impl Future<Output = Result<R, CallError>>`.
pub struct AsyncHandler<F, A> {
    func: F,
    _args: PhantomData<fn(A)>,
}

impl<F, A> AsyncHandler<F, A> {
    pub fn new(func: F) -> Self {
        Self { func, _args: PhantomData }
    }
}

#[async_trait::async_trait]
impl<F, A, Fut, R> Handler for AsyncHandler<F, A>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    A: FromParams + Send + 'static,
    Fut: Future<Output = Result<R, CallError>> + Send + 'static,
    R: Into<Value> + Send + 'static,
{
    async fn invoke(&self, params: Vec<Value>) -> CallResult {
        let pending = {
            let args = A::from_params(params)?;
            (self.func)(args)
        };
        pending.await.map(Into::into)
    }
}

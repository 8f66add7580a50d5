//! # Aiorpc
//!
//! Non-blocking XML-RPC on tokio: a client proxy, a batching multicall client,
//! and a dispatcher that serves sync and async handlers.
//!
//! ## Architecture
//!
//! - `client` / `multicall`: `ServerProxy`, `Method` and `MultiCall` on the calling side.
//! - `transport` / `http`: the `Transport` seam and its `reqwest` implementation.
//! - `handler` / `instance` / `dispatcher` / `system`: the serving side.
//! - `server`: the `axum` binding that puts a dispatcher on the network.
//!
//! Data flows proxy → `xmlrpc::encode_call` → transport → `Dispatcher::marshaled_dispatch`
//! → handler → `xmlrpc::encode_response` → transport → proxy.

pub mod client;
pub mod dispatcher;
pub mod handler;
pub mod http;
pub mod instance;
pub mod multicall;
pub mod server;
pub mod system;
pub mod transport;

#[cfg(test)]
mod mock_transport;

pub use client::Method;
pub use client::ServerProxy;
pub use client::ServerProxyBuilder;
pub use dispatcher::Dispatcher;
pub use handler::CallError;
pub use handler::CallResult;
pub use handler::Handler;
pub use http::HttpTransport;
pub use instance::Instance;
pub use instance::Namespace;
pub use multicall::MultiCall;
pub use server::Server;
pub use server::ServerConfig;
pub use server::ServerHandle;
pub use transport::LoopbackTransport;
pub use transport::ProtocolError;
pub use transport::Transport;

pub use xmlrpc::Encoding;
pub use xmlrpc::Fault;
pub use xmlrpc::Options;
pub use xmlrpc::Value;

/// Builds a positional parameter list: `params![8, 2]` is `vec![Value::from(8), Value::from(2)]`.
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($value:expr),+ $(,)?) => { ::std::vec![$($crate::Value::from($value)),+] };
}

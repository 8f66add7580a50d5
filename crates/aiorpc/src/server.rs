//! # HTTP Server
//!
//! Serves a `Dispatcher` over HTTP with `axum`. Every configured rpc path accepts
//! `POST` with an XML-RPC document and answers `200 text/xml`, faults included.
//!
//! ```ignore
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.register_function("pow", |(x, y): (i32, u32)| Ok(x.pow(y)));
//! let handle = Server::new(ServerConfig::default(), dispatcher).spawn().await?;
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatcher::Dispatcher;

/// Paths served unless configured otherwise.
pub const DEFAULT_RPC_PATHS: [&str; 3] = ["/", "/RPC2", "/xmlrpc"];

#[derive(Debug)]
pub enum Error {
    Bind { addr: SocketAddr, source: io::Error },
    Serve(io::Error),
    Join(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "Failed to bind {}: {}", addr, source),
            Self::Serve(e) => write!(f, "Server error: {}", e),
            Self::Join(msg) => write!(f, "Server task failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Serve(e) => Some(e),
            Self::Join(_) => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Serve(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Where and how to serve.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub rpc_paths: Vec<String>,
    /// Log one line per served request.
    pub log_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            rpc_paths: DEFAULT_RPC_PATHS.iter().map(|p| p.to_string()).collect(),
            log_requests: true,
        }
    }
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, ..Self::default() }
    }

    pub fn rpc_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.rpc_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn log_requests(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    log_requests: bool,
}

/// An XML-RPC endpoint bound to a dispatcher.
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher: Arc::new(dispatcher) }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// One `POST` route per configured rpc path.
    pub fn router(&self) -> Router {
        let state = AppState { dispatcher: self.dispatcher.clone(), log_requests: self.config.log_requests };

        let mut paths = self.config.rpc_paths.clone();
        paths.sort();
        paths.dedup();

        paths
            .iter()
            .fold(Router::new(), |router, path| router.route(path, post(handle_xmlrpc)))
            .with_state(state)
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn serve_on(self, listener: TcpListener, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let router = self.router();
        info!(addr = %listener.local_addr()?, paths = ?self.config.rpc_paths, "serving XML-RPC");
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await?;
        Ok(())
    }

    /// Binds and serves in a background task.
    ///
    /// Binding to port 0 picks a free port; `ServerHandle::local_addr` reports it.
    pub async fn spawn(self) -> Result<ServerHandle> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.serve_on(listener, async move {
            let _ = shutdown_rx.await;
        }));

        Ok(ServerHandle { local_addr, shutdown: shutdown_tx, task })
    }
}

async fn handle_xmlrpc(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    if state.log_requests {
        info!(bytes = body.len(), "POST xmlrpc request");
    }
    let response = state.dispatcher.marshaled_dispatch(&body).await;
    ([(CONTENT_TYPE, "text/xml")], response)
}

/// A server running in a background task.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `http://ADDR` followed by `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.local_addr, path)
    }

    /// Stops accepting connections, lets in-flight requests finish and waits.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await.map_err(|e| Error::Join(e.to_string()))?
    }
}

//! # aiorpcd
//!
//! Serves a small demo API over XML-RPC until interrupted.
//!
//! - `AIORPC_ADDR`: listen address, `127.0.0.1:8080` by default.
//! - `RUST_LOG`: log filter, `info` by default.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aiorpc::CallError;
use aiorpc::Dispatcher;
use aiorpc::Namespace;
use aiorpc::Server;
use aiorpc::ServerConfig;

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn api() -> Namespace {
    let version = Namespace::new()
        .function("info", |_: ()| Ok("1.0.0"))
        .help("info", "Version of this server.");

    Namespace::new()
        .async_function("sleep", |_: ()| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, CallError>("done")
        })
        .help("sleep", "Waits one second without blocking other calls.")
        .object("version", version)
}

fn division(args: (f64, f64)) -> Result<f64, CallError> {
    let (x, y) = args;
    if y == 0.0 {
        return Err(CallError::new("ZeroDivisionError", "division by zero"));
    }
    Ok(x / y)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr: SocketAddr = std::env::var("AIORPC_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()
        .context("invalid AIORPC_ADDR")?;

    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register_function("division", division)
        .set_method_help("division", "Divides x by y.")
        .register_multicall_functions()
        .register_introspection_functions()
        .register_instance(api(), true);

    info!(%addr, methods = ?dispatcher.system_list_methods(), "starting aiorpcd");

    let server = Server::new(ServerConfig::new(addr), dispatcher);
    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}

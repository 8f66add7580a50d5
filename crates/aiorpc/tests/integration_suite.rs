//! Integration tests: a real server on an ephemeral port, called over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::NaiveDate;
use chrono::NaiveDateTime;

use aiorpc::CallError;
use aiorpc::Dispatcher;
use aiorpc::MultiCall;
use aiorpc::Namespace;
use aiorpc::Server;
use aiorpc::ServerConfig;
use aiorpc::ServerHandle;
use aiorpc::ServerProxy;
use aiorpc::Value;
use aiorpc::client::Error;
use aiorpc::params;

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 17).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

async fn start() -> ServerHandle {
    let mut dispatcher = Dispatcher::new();
    dispatcher
        .register_function("pow", |(x, y): (i32, i32)| {
            let exp = u32::try_from(y).map_err(|_| CallError::new("ValueError", "negative exponent"))?;
            Ok(x.pow(exp))
        })
        .register_function("add", |(x, y): (i32, i32)| Ok(x + y))
        .register_async_function("multiply", |(x, y): (i32, i32)| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, CallError>(x * y)
        })
        .register_multicall_functions()
        .register_introspection_functions()
        .register_instance(
            Namespace::new()
                .function("get_data", |_: ()| Ok("42"))
                .object("dt", Namespace::new().function("now", |_: ()| Ok(noon()))),
            true,
        );

    let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0))).log_requests(false);
    Server::new(config, dispatcher).spawn().await.expect("Failed to start server")
}

fn proxy(url: String) -> ServerProxy {
    ServerProxy::builder(url)
        .use_env_proxy(false)
        .timeout(Some(Duration::from_secs(5)))
        .build()
        .expect("Failed to build proxy")
}

// --- Test 1: Functions ---

#[tokio::test]
async fn test_registered_functions() {
    let server = start().await;
    let proxy = proxy(server.url("/RPC2"));

    assert_eq!(proxy.call("pow", params![2, 8]).await.unwrap(), Value::Int(256));
    assert_eq!(proxy.method("add").call(params![2, 3]).await.unwrap(), Value::Int(5));
    assert_eq!(proxy.method("multiply").call(params![6, 7]).await.unwrap(), Value::Int(42));

    let err = proxy.call("pow", params![2, -1]).await.unwrap_err();
    assert!(matches!(err, Error::Fault(ref f) if f.message == "ValueError:negative exponent"), "{:?}", err);

    server.shutdown().await.unwrap();
}

// --- Test 2: Instance ---

#[tokio::test]
async fn test_instance_methods() {
    let server = start().await;
    let proxy = proxy(server.url("/RPC2"));

    assert_eq!(proxy.method("get_data").call(params![]).await.unwrap(), Value::from("42"));
    assert_eq!(proxy.method("dt").child("now").call(params![]).await.unwrap(), Value::DateTime(noon()));

    server.shutdown().await.unwrap();
}

// --- Test 3: Multicall ---

#[tokio::test]
async fn test_multicall_round_trip() {
    let server = start().await;
    let proxy = proxy(server.url("/RPC2"));

    let mut multicall = MultiCall::new(&proxy);
    multicall.add("add", params![1, 1]).add("missing", params![]);
    multicall.method("multiply").queue(params![3, 3]);

    let results = multicall.call().await.unwrap().into_vec();
    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], Ok(Value::Int(2))));
    assert!(matches!(&results[1], Err(Error::Fault(f)) if f.message == "Exception:method \"missing\" is not supported"));
    assert!(matches!(results[2], Ok(Value::Int(9))));

    server.shutdown().await.unwrap();
}

// --- Test 4: Routing ---

#[tokio::test]
async fn test_every_rpc_path_is_served() {
    let server = start().await;

    for path in ["/", "/RPC2", "/xmlrpc"] {
        let proxy = proxy(server.url(path));
        assert_eq!(proxy.call("add", params![20, 22]).await.unwrap(), Value::Int(42), "path {}", path);
    }

    let err = proxy(server.url("/nope")).call("add", params![1, 2]).await.unwrap_err();
    match err {
        Error::Protocol(e) => assert_eq!(e.status, 404),
        other => panic!("expected a protocol error, got {:?}", other),
    }

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_introspection_over_http() {
    let server = start().await;
    let proxy = proxy(server.url("/"));

    let names = proxy.method("system").child("listMethods").call(params![]).await.unwrap();
    let names: Vec<String> = names.as_array().unwrap().iter().map(|v| v.as_str().unwrap().to_string()).collect();
    assert!(names.contains(&"get_data".to_string()));
    assert!(names.contains(&"system.multicall".to_string()));
    assert!(!names.contains(&"dt".to_string()));

    server.shutdown().await.unwrap();
}

// --- Test 5: Connection failure ---

#[tokio::test]
async fn test_connection_refused_is_status_zero() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let proxy = proxy(format!("http://{}/RPC2", addr));
    let err = proxy.call("add", params![1, 2]).await.unwrap_err();
    match err {
        Error::Protocol(e) => {
            assert_eq!(e.status, 0);
            assert!(e.headers.is_empty());
        },
        other => panic!("expected a protocol error, got {:?}", other),
    }
}

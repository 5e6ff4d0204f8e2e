//! Retry and classification behaviour against a live mock upstream.

mod common;

use serde_json::json;
use std::time::{Duration, Instant};

use chain_relay::blockchain::{RpcError, RpcInvoker};
use chain_relay::resilience::FailureCategory;
use common::{gateway_config, start_upstream, Reply};

fn invoker(upstream: &common::MockUpstream) -> RpcInvoker {
    let config = gateway_config(upstream);
    RpcInvoker::new(&config.upstream, &config.retries).unwrap()
}

#[tokio::test]
async fn transient_failures_then_success_use_whole_budget() {
    let upstream = start_upstream(|call, _| {
        if call < 2 {
            Reply::status(503)
        } else {
            Reply::result(json!("0x10"))
        }
    })
    .await;

    let result = invoker(&upstream)
        .invoke("eth_blockNumber", vec![], "eth-mainnet")
        .await
        .unwrap();

    assert_eq!(result, json!("0x10"));
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn persistent_transient_failure_is_retryable_after_budget() {
    let upstream = start_upstream(|_, _| Reply::status(502)).await;

    let err = invoker(&upstream)
        .invoke("eth_blockNumber", vec![], "eth-mainnet")
        .await
        .unwrap_err();

    let failure = err.failure().unwrap();
    assert_eq!(failure.category, FailureCategory::ServerError);
    assert!(failure.transient);
    assert_eq!(failure.status, Some(502));
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let upstream = start_upstream(|_, _| Reply::status(401)).await;

    let err = invoker(&upstream)
        .invoke("eth_blockNumber", vec![], "eth-mainnet")
        .await
        .unwrap_err();

    let failure = err.failure().unwrap();
    assert_eq!(failure.category, FailureCategory::AuthError);
    assert!(!failure.transient);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn error_object_in_success_body_is_permanent() {
    let upstream = start_upstream(|_, _| Reply::rpc_error(-32601, "method not found")).await;

    let err = invoker(&upstream)
        .invoke("eth_fooBar", vec![], "eth-mainnet")
        .await
        .unwrap_err();

    let failure = err.failure().unwrap();
    assert_eq!(failure.category, FailureCategory::ProtocolError);
    assert!(failure.message.contains("method not found"));
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn retry_after_header_overrides_backoff() {
    let upstream = start_upstream(|call, _| {
        if call == 0 {
            Reply::status(429).with_retry_after("1")
        } else {
            Reply::result(json!("0x3b9aca00"))
        }
    })
    .await;

    let started = Instant::now();
    let result = invoker(&upstream)
        .invoke("eth_gasPrice", vec![], "eth-mainnet")
        .await
        .unwrap();

    assert_eq!(result, json!("0x3b9aca00"));
    assert_eq!(upstream.calls(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn dropping_the_call_stops_further_attempts() {
    let upstream = start_upstream(|call, _| {
        if call == 0 {
            Reply::status(503)
        } else {
            Reply::status(503).with_delay(Duration::from_millis(300))
        }
    })
    .await;
    let invoker = invoker(&upstream);

    let outcome = tokio::time::timeout(
        Duration::from_millis(150),
        invoker.invoke("eth_blockNumber", vec![], "eth-mainnet"),
    )
    .await;
    assert!(outcome.is_err(), "call should still be in flight");
    assert_eq!(upstream.calls(), 2);

    // A live retry loop would see the stalled 503 and try a third time.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn unknown_target_never_reaches_upstream() {
    let upstream = start_upstream(|_, _| Reply::result(json!("0x1"))).await;

    let err = invoker(&upstream)
        .invoke("eth_blockNumber", vec![], "127.0.0.1:1/#")
        .await
        .unwrap_err();

    assert!(matches!(err, RpcError::Validation(_)));
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn envelope_and_client_header_are_sent() {
    let upstream = start_upstream(|_, _| Reply::result(json!("0x0"))).await;
    let invoker = invoker(&upstream);

    invoker
        .invoke(
            "eth_getBalance",
            vec![json!("0x00000000219ab540356cBB839Cbe05303d7705Fa"), json!("latest")],
            "base-mainnet",
        )
        .await
        .unwrap();
    invoker.invoke("eth_blockNumber", vec![], "eth-mainnet").await.unwrap();

    let requests = upstream.requests();
    assert_eq!(requests.len(), 2);
    let (headers, body) = &requests[0];
    assert!(headers.get("x-client-id").is_some());
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["method"], "eth_getBalance");
    assert_eq!(body["params"][1], "latest");

    let first = body["id"].as_u64().unwrap();
    let second = requests[1].1["id"].as_u64().unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn unreachable_upstream_is_network_error() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = chain_relay::GatewayConfig::default();
    config.upstream.url_template = format!("http://{addr}/{{target}}/{{api_key}}");
    config.retries.initial_delay_ms = 5;
    let invoker = RpcInvoker::new(&config.upstream, &config.retries).unwrap();

    let err = invoker
        .invoke("eth_blockNumber", vec![], "eth-mainnet")
        .await
        .unwrap_err();
    let failure = err.failure().unwrap();
    assert_eq!(failure.category, FailureCategory::NetworkError);
    assert!(failure.transient);
}

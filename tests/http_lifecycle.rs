//! End-to-end lifecycle tests against a real HTTP listener.

use std::sync::Arc;
use std::time::Duration;

use serverkit::config::ServerConfig;
use serverkit::lifecycle::{Lifecycle, LifecycleState};
use serverkit::net::BindError;
use serverkit::{HttpServer, RequestMetrics};

mod common;

fn ephemeral_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

#[tokio::test]
async fn test_serve_then_graceful_shutdown() {
    let metrics = Arc::new(RequestMetrics::new());
    let handle = HttpServer::bind_handle(&ephemeral_config(), common::ping_app(), Arc::clone(&metrics))
        .await
        .expect("bind should succeed");
    let addr = handle.addr();
    assert_ne!(addr.port(), 0);

    handle.start().unwrap();

    let res = common::client()
        .get(format!("http://{}/ping", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "pong");

    handle
        .request_shutdown(Some(Duration::from_secs(2)))
        .await
        .expect("shutdown within deadline");

    tokio::time::timeout(Duration::from_secs(2), handle.terminated().fired())
        .await
        .expect("terminated should already have fired");
    assert!(handle.last_error().is_none());
    assert_eq!(metrics.total("GET"), 1);
    assert_eq!(metrics.in_flight(), 0);
}

#[tokio::test]
async fn test_vars_endpoint_over_http() {
    let metrics = Arc::new(RequestMetrics::new());
    let handle = HttpServer::bind_handle(&ephemeral_config(), common::ping_app(), Arc::clone(&metrics))
        .await
        .unwrap();
    handle.start().unwrap();
    let client = common::client();

    client
        .get(format!("http://{}/ping", handle.addr()))
        .send()
        .await
        .unwrap();
    let vars: serde_json::Value = client
        .get(format!("http://{}/debug/vars", handle.addr()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(vars["http_requests_total"]["GET"], 1);
    assert!(vars["http_request_duration_ms"]["GET"].is_u64());

    handle.request_shutdown(None).await.unwrap();
}

#[tokio::test]
async fn test_run_until_with_cleanups() {
    let metrics = Arc::new(RequestMetrics::new());
    let handle = HttpServer::bind_handle(&ephemeral_config(), common::ping_app(), metrics)
        .await
        .unwrap();
    let addr = handle.addr();

    let log = common::call_log();
    let mut lifecycle = Lifecycle::from_config(handle, &ServerConfig::default().lifecycle);
    for name in ["database", "cache"] {
        let log = Arc::clone(&log);
        lifecycle.on_cleanup(name, move || {
            log.lock().unwrap().push(name);
            Ok::<_, std::io::Error>(())
        });
    }

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let client = common::client();
    let requester = tokio::spawn(async move {
        // Retry until the serve loop is up.
        let mut status = None;
        for _ in 0..50 {
            if let Ok(res) = client.get(format!("http://{}/ping", addr)).send().await {
                status = Some(res.status());
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = stop_tx.send(());
        status
    });

    lifecycle
        .run_until(async {
            let _ = stop_rx.await;
        })
        .await
        .unwrap();

    assert_eq!(requester.await.unwrap().map(|s| s.as_u16()), Some(200));
    assert_eq!(*log.lock().unwrap(), vec!["cache", "database"]);
    assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    assert!(lifecycle.handle().is_terminated());
}

#[tokio::test]
async fn test_bind_conflict_fails_before_handle_exists() {
    let metrics = Arc::new(RequestMetrics::new());
    let first = HttpServer::bind_handle(&ephemeral_config(), common::ping_app(), Arc::clone(&metrics))
        .await
        .unwrap();

    let mut config = ServerConfig::default();
    config.listener.bind_address = first.addr().to_string();
    let second = HttpServer::bind_handle(&config, common::ping_app(), metrics).await;

    assert!(matches!(second, Err(BindError::Bind { .. })));
}

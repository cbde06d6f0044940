//! Failure injection tests for the caching proxy.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_retry_on_failure() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let backend = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                (503, r#"{"error":"busy"}"#.into())
            } else {
                (200, r#"{"fixtures":[]}"#.into())
            }
        }
    })
    .await;

    let (proxy, shutdown) = common::start_proxy(common::proxy_config(backend)).await;

    let res = common::client()
        .get(format!("http://{}/api/fixtures", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK, "Should eventually succeed after retries");
    assert_eq!(res.headers()["x-proxy-cache"], "MISS");
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "fixtures": [] }));
    assert_eq!(call_count.load(Ordering::SeqCst), 3, "Should have attempted 3 times");

    shutdown.trigger();
}

#[tokio::test]
async fn test_stale_fallback_after_upstream_outage() {
    let healthy = Arc::new(AtomicBool::new(true));
    let h = healthy.clone();
    let backend = common::start_programmable_backend(move |_| {
        let h = h.clone();
        async move {
            if h.load(Ordering::SeqCst) {
                (200, r#"{"teams":[1,2]}"#.into())
            } else {
                (500, r#"{"error":"internal"}"#.into())
            }
        }
    })
    .await;

    let mut config = common::proxy_config(backend);
    config.cache.ttl_default_secs = 1;
    let (proxy, shutdown) = common::start_proxy(config).await;
    let client = common::client();
    let url = format!("http://{}/api/teams", proxy);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("x-proxy-stale").is_none());

    healthy.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-proxy-stale"], "1");
    assert_eq!(res.headers()["x-proxy-upstream-status"], "500");
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "teams": [1, 2] }));

    shutdown.trigger();
}

#[tokio::test]
async fn test_gateway_error_when_upstream_unreachable() {
    // Reserve a port, then close it so every connect is refused.
    let closed: SocketAddr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (proxy, shutdown) = common::start_proxy(common::proxy_config(closed)).await;

    let res = common::client()
        .get(format!("http://{}/api/bootstrap-static", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.headers()["cache-control"], "no-store");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Upstream request failed");
    assert!(body["details"].is_string());

    shutdown.trigger();
}

#[tokio::test]
async fn test_method_not_allowed_never_reaches_upstream() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let backend = common::start_programmable_backend(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        async { (200, "{}".into()) }
    })
    .await;

    let (proxy, shutdown) = common::start_proxy(common::proxy_config(backend)).await;
    let client = common::client();

    let res = client
        .post(format!("http://{}/api/fixtures", proxy))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = client
        .delete(format!("http://{}/api/entry/1", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(call_count.load(Ordering::SeqCst), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_aggregate_summary_partial_failure() {
    let entries: HashMap<&'static str, &'static str> = HashMap::from([
        ("/api/entry/1/", r#"{"id":1,"name":"One"}"#),
        ("/api/entry/2/", r#"{"id":2,"name":"Two"}"#),
    ]);
    let entries = Arc::new(entries);
    let backend = common::start_programmable_backend(move |target| {
        let entries = entries.clone();
        async move {
            match entries.get(target.as_str()) {
                Some(body) => (200, body.to_string()),
                None => (404, r#"{"detail":"Not found."}"#.into()),
            }
        }
    })
    .await;

    let (proxy, shutdown) = common::start_proxy(common::proxy_config(backend)).await;

    let res = common::client()
        .get(format!("http://{}/api/aggregate/summary?ids=1,2,999", proxy))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["data"]["name"], "One");
    assert_eq!(results[1]["data"]["name"], "Two");
    assert_eq!(results[2], json!({ "id": 999, "ok": false, "status": 404 }));

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_concurrency_is_capped() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (f, p) = (in_flight.clone(), peak.clone());
    let backend = common::start_programmable_backend(move |_| {
        let (f, p) = (f.clone(), p.clone());
        async move {
            let now = f.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            f.fetch_sub(1, Ordering::SeqCst);
            (200, "{}".into())
        }
    })
    .await;

    let mut config = common::proxy_config(backend);
    config.scheduler.max_concurrent = 2;
    let (proxy, shutdown) = common::start_proxy(config).await;
    let client = common::client();

    let requests = (1..=6).map(|id| {
        let client = client.clone();
        let url = format!("http://{}/api/element-summary/{}", proxy, id);
        tokio::spawn(async move { client.get(url).send().await.map(|r| r.status()) })
    });
    for handle in requests.collect::<Vec<_>>() {
        assert_eq!(handle.await.unwrap().unwrap(), StatusCode::OK);
    }

    assert!(peak.load(Ordering::SeqCst) <= 2, "peak in-flight was {}", peak.load(Ordering::SeqCst));

    shutdown.trigger();
}

//! Drives a real listener with raw HTTP/1.1, a keep-alive client and an h2c
//! client, and checks what the recorder saw.
//!
//! Kept to a single test: the active metrics sink is process-wide.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Request, StatusCode, Version};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use srvmeter_core::registry::memory::SeriesValue;
use srvmeter_server::app_state::AppState;
use srvmeter_server::{config, router, sink};

async fn http(addr: SocketAddr, req: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(req.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    String::from_utf8(buf).unwrap()
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
}

async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn records_request_and_connection_lifecycle() {
    let cfg = config::load_from_str("version: 1\nmetrics:\n  prefix: \"it\"\n").unwrap();
    let state = AppState::new(cfg).unwrap();
    let recorder = state.recorder().unwrap();
    let registry = state.registry();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local = listener.local_addr().unwrap();
    tokio::spawn(router::serve(listener, state.clone()));

    let resp = http(
        local,
        "POST /echo HTTP/1.1\r\nHost: test\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
    )
    .await;
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.ends_with("hello"), "{resp}");

    // no Content-Length: bytes are counted as the chunks arrive
    let resp = http(
        local,
        "POST /echo HTTP/1.1\r\nHost: test\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
         3\r\nhel\r\n2\r\nlo\r\n0\r\n\r\n",
    )
    .await;
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.ends_with("hello"), "{resp}");

    let resp = http(local, &get("/items/7")).await;
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    let resp = http(local, &get("/items/8")).await;
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");

    let resp = http(local, &get("/fail")).await;
    assert!(resp.starts_with("HTTP/1.1 500"), "{resp}");

    assert!(sink::active().is_some());

    // close is reported once the connection's last handle drops
    assert!(eventually(|| recorder.active_connections() == 0).await);
    assert!(eventually(|| recorder.total_connections() == 0).await);

    let received = registry.find("it.data.received", &[("uri", "/echo")]).unwrap();
    assert_eq!(
        received.value,
        SeriesValue::DistributionSummary { count: 2, total: 10, max: 5 }
    );
    let sent = registry.find("it.data.sent", &[("uri", "/echo")]).unwrap();
    assert_eq!(sent.value, SeriesValue::DistributionSummary { count: 2, total: 10, max: 5 });
    let received_time = registry
        .find("it.data.received.time", &[("uri", "/echo"), ("method", "POST")])
        .unwrap();
    assert!(matches!(received_time.value, SeriesValue::Timer { count: 2, .. }));
    let sent_time = registry
        .find(
            "it.data.sent.time",
            &[("uri", "/echo"), ("method", "POST"), ("status", "200")],
        )
        .unwrap();
    assert!(matches!(sent_time.value, SeriesValue::Timer { count: 2, .. }));

    // both item requests share the route template
    let items = registry
        .find(
            "it.response.time",
            &[("uri", "/items/:id"), ("method", "GET"), ("status", "200")],
        )
        .unwrap();
    assert!(matches!(items.value, SeriesValue::Timer { count: 2, .. }));

    let errors = registry.find("it.errors", &[("uri", "/fail")]).unwrap();
    assert_eq!(errors.value, SeriesValue::Counter { count: 1 });
    assert!(registry.find("it.errors", &[("uri", "/echo")]).is_none());

    let local_str = local.to_string();
    let conn_gauge = registry
        .find(
            "it.connections.active",
            &[("uri", "http"), ("local.address", local_str.as_str())],
        )
        .unwrap();
    assert_eq!(conn_gauge.value, SeriesValue::Gauge { value: 0 });
    let total_gauge = registry
        .find(
            "it.connections.total",
            &[("uri", "http"), ("local.address", local_str.as_str())],
        )
        .unwrap();
    assert_eq!(total_gauge.value, SeriesValue::Gauge { value: 0 });

    // an idle keep-alive connection is open but not active
    let stream = TcpStream::connect(local).await.unwrap();
    let (mut h1, h1_conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    let h1_task = tokio::spawn(h1_conn);
    let req = Request::get("/items/1")
        .header("host", "test")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let resp = h1.send_request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.into_body().collect().await.unwrap();

    assert!(eventually(|| recorder.active_connections() == 0).await);
    assert_eq!(recorder.total_connections(), 1);
    let total_gauge = registry
        .find(
            "it.connections.total",
            &[("uri", "http"), ("local.address", local_str.as_str())],
        )
        .unwrap();
    assert_eq!(total_gauge.value, SeriesValue::Gauge { value: 1 });

    // h2c with prior knowledge: each request is a stream on the connection
    let stream = TcpStream::connect(local).await.unwrap();
    let (mut h2, h2_conn) =
        hyper::client::conn::http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
            .await
            .unwrap();
    let h2_task = tokio::spawn(h2_conn);
    let req = Request::get(format!("http://{local}/items/2"))
        .body(Empty::<Bytes>::new())
        .unwrap();
    let resp = h2.send_request(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.version(), Version::HTTP_2);
    resp.into_body().collect().await.unwrap();

    assert!(eventually(|| recorder.active_streams() == 0).await);
    assert!(eventually(|| recorder.active_connections() == 0).await);
    assert_eq!(recorder.total_connections(), 2);
    let streams = registry
        .find(
            "it.streams.active",
            &[("uri", "http"), ("local.address", local_str.as_str())],
        )
        .unwrap();
    assert_eq!(streams.value, SeriesValue::Gauge { value: 0 });
    // HTTP/1.1 requests never touched the stream gauge before this
    assert_eq!(registry.series_count("it.streams.active"), 1);

    drop(h1);
    drop(h2);
    h1_task.abort();
    h2_task.abort();
    assert!(eventually(|| recorder.total_connections() == 0).await);

    let items = registry
        .find(
            "it.response.time",
            &[("uri", "/items/:id"), ("method", "GET"), ("status", "200")],
        )
        .unwrap();
    assert!(matches!(items.value, SeriesValue::Timer { count: 4, .. }));

    let text = http(local, &get("/metrics")).await;
    assert!(text.contains("it_response_time_seconds_count{uri=\"/items/:id\",method=\"GET\",status=\"200\"} 4"), "{text}");
    assert!(text.contains("it_errors_total{uri=\"/fail\"} 1"), "{text}");
    assert!(text.contains("# HELP it_errors_total Number of errors that occurred."), "{text}");

    let json = http(local, &get("/metrics/json")).await;
    let body = json.split("\r\n\r\n").nth(1).unwrap();
    let series: serde_json::Value = serde_json::from_str(body).unwrap();
    assert!(series
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s["name"] == "it.data.received" && s["type"] == "distribution_summary"));

    // ops routes are not metered
    assert!(registry
        .find("it.data.received", &[("uri", "/metrics")])
        .is_none());

    sink::uninstall();
    assert!(sink::active().is_none());
}

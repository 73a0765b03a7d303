//! Request middleware reporting HTTP lifecycle events.
//!
//! - `uri` is the matched route template, so dimension values stay bounded
//! - bytes are counted as bodies stream; received/sent events fire when the
//!   request/response body ends
//! - the connection is active from request entry until its response body ends
//! - 5xx responses count as errors
//! - HTTP/2 requests are reported as streams on the local address

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::Version;
use axum::middleware::Next;
use axum::response::Response;
use srvmeter_core::HttpServerMetricsRecorder;

use super::body::MeteredBody;
use super::connection::ConnMeta;

const UNKNOWN_PEER: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

pub async fn record_http(
    State(recorder): State<Arc<dyn HttpServerMetricsRecorder>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    // MatchedPath is only missing when the layer wraps a service directly
    // instead of being applied with `route_layer`.
    let uri = match req.extensions().get::<MatchedPath>() {
        Some(p) => p.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let method = req.method().as_str().to_owned();
    let conn = req
        .extensions()
        .get::<ConnectInfo<ConnMeta>>()
        .map(|ConnectInfo(meta)| meta.clone());
    let remote = conn.as_ref().map_or(UNKNOWN_PEER, |m| m.remote);
    let in_flight = conn.as_ref().and_then(ConnMeta::begin_request);
    let stream_local = match conn.as_ref().and_then(|m| m.local) {
        Some(local) if req.version() == Version::HTTP_2 => Some(local),
        _ => None,
    };

    if let Some(local) = &stream_local {
        recorder.record_stream_opened(local);
    }

    let received = {
        let recorder = Arc::clone(&recorder);
        let uri = uri.clone();
        let method = method.clone();
        move |bytes: u64| {
            recorder.record_uri_data_received(&remote, &uri, bytes);
            recorder.record_data_received_time(&uri, &method, start.elapsed());
        }
    };
    let req = req.map(|body| Body::new(MeteredBody::new(body, received)));

    let resp = next.run(req).await;

    let status = resp.status();
    if status.is_server_error() {
        recorder.increment_uri_errors_count(&remote, &uri);
    }
    let status = status.as_str().to_owned();
    let sending = Instant::now();

    let sent = move |bytes: u64| {
        recorder.record_uri_data_sent(&remote, &uri, bytes);
        recorder.record_data_sent_time(&uri, &method, &status, sending.elapsed());
        recorder.record_response_time(&uri, &method, &status, start.elapsed());
        if let Some(local) = &stream_local {
            recorder.record_stream_closed(local);
        }
        drop(in_flight);
    };
    resp.map(|body| Body::new(MeteredBody::new(body, sent)))
}

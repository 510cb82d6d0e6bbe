// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! End-to-end fallback behavior against in-process fake providers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use flight_feed::state::Source;
use flight_feed::{Gateway, HttpUpstream, UpstreamConfig};
use flight_gateway::{router, FLIGHTS_PATH};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// A fake provider that answers every request with `status` and `body`.
async fn fake_provider(status: StatusCode, body: Value) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = Router::new().route(
        "/states",
        get(move || {
            let counter = Arc::clone(&counter);
            let body = body.to_string();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (status, [("content-type", "application/json")], body)
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/states"), hits)
}

/// An address nothing is listening on.
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/states")
}

/// A provider that accepts connections and never answers.
async fn silent_provider() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(socket);
        }
    });
    (format!("http://{addr}/states"), accepted)
}

fn upstream(url: String, source: Source) -> HttpUpstream {
    upstream_with_timeout(url, source, Duration::from_secs(5))
}

fn upstream_with_timeout(url: String, source: Source, timeout: Duration) -> HttpUpstream {
    HttpUpstream::new(
        HttpUpstream::default_client().unwrap(),
        UpstreamConfig { url, timeout, source },
    )
}

async fn get_flights(primary: String, fallback: String) -> Value {
    let gateway = Gateway::new(upstream(primary, Source::OpenSky), upstream(fallback, Source::Demo));
    serve_flights(gateway).await
}

async fn serve_flights(gateway: Gateway<HttpUpstream>) -> Value {
    let response = router(Arc::new(gateway))
        .oneshot(Request::get(FLIGHTS_PATH).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn demo_states() -> Value {
    json!({
        "time": 1_700_000_100,
        "states": [
            ["4b1805", "SWR12   ", "Switzerland", 1, 1, 8.5, 47.4, 10000.0, false, 230.0, 45.0, 0.0, null, 10100.0, "1000", false, 0],
            ["4b1806", "SWR13", "Switzerland", 1, 1, 8.5, 47.4, 0.0, true, 0.0, 0.0, 0.0, null, 0.0, null, false, 0],
            ["4b1807", "", "Switzerland", 1, 1, null, 47.4, 0.0, false, 0.0, 0.0, 0.0, null, 0.0, null, false, 0]
        ]
    })
}

#[tokio::test]
async fn test_primary_success_skips_fallback() {
    let (primary, primary_hits) = fake_provider(StatusCode::OK, demo_states()).await;
    let (fallback, fallback_hits) = fake_provider(StatusCode::OK, json!({"time": 1, "states": []})).await;

    let body = get_flights(primary, fallback).await;

    assert_eq!(body["source"], "opensky");
    assert_eq!(body["count"], 1);
    assert_eq!(body["flights"][0]["callsign"], "SWR12");
    assert_eq!(primary_hits.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_primary_outage_falls_back_to_demo() {
    let (primary, primary_hits) =
        fake_provider(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"})).await;
    let (fallback, fallback_hits) = fake_provider(StatusCode::OK, demo_states()).await;

    let body = get_flights(primary, fallback).await;

    assert_eq!(body["source"], "demo");
    assert_eq!(body["time"], 1_700_000_100);
    assert_eq!(body["count"], 1);
    assert_eq!(body["flights"][0]["icao24"], "4b1805");
    assert_eq!(primary_hits.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_primary_timeout_falls_back_to_demo() {
    let (primary, primary_accepts) = silent_provider().await;
    let (fallback, fallback_hits) = fake_provider(StatusCode::OK, demo_states()).await;
    let gateway = Gateway::new(
        upstream_with_timeout(primary, Source::OpenSky, Duration::from_millis(300)),
        upstream(fallback, Source::Demo),
    );

    let body = tokio::time::timeout(Duration::from_secs(5), serve_flights(gateway))
        .await
        .expect("gateway answered after the primary timed out");

    assert_eq!(body["source"], "demo");
    assert_eq!(body["count"], 1);
    assert_eq!(primary_accepts.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_null_states_is_empty_snapshot() {
    let (primary, _) = fake_provider(StatusCode::OK, json!({"time": 5, "states": null})).await;
    let (fallback, fallback_hits) = fake_provider(StatusCode::OK, demo_states()).await;

    let body = get_flights(primary, fallback).await;

    assert_eq!(body, json!({"time": 5, "flights": [], "source": "opensky", "count": 0}));
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_both_fail_with_fallback_status() {
    let primary = closed_port().await;
    let (fallback, fallback_hits) =
        fake_provider(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;

    let body = get_flights(primary, fallback).await;

    assert_eq!(
        body,
        json!({"error": "Failed to fetch flight data from both APIs", "flights": [], "count": 0})
    );
    assert_eq!(fallback_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_both_unreachable_reports_error() {
    let body = get_flights(closed_port().await, closed_port().await).await;

    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Error fetching flight data: "), "{error}");
    assert_eq!(body["flights"], json!([]));
    assert_eq!(body["count"], 0);
}

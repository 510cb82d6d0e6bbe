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

//! HTTP front end for [`flight_feed::Gateway`].
//!
//! Serves `GET /api/flights`. The body is either a snapshot
//! (`time`, `flights`, `source`, `count`) or, when both providers failed, a
//! failure (`error`, `flights: []`, `count: 0`). Both are sent with HTTP 200.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use flight_feed::state::Source;
use flight_feed::upstream::{DEMO_TIMEOUT, DEMO_URL, OPENSKY_TIMEOUT, OPENSKY_URL};
use flight_feed::{FlightsResponse, Gateway, HttpUpstream, Upstream, UpstreamConfig, UpstreamError};
use log::info;
use thiserror::Error;
use tokio::net::TcpListener;

/// Path of the flights endpoint.
pub const FLIGHTS_PATH: &str = "/api/flights";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] UpstreamError),
    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Command line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "flight-gateway", version, about = "Serve live flights with provider fallback")]
pub struct GatewayArgs {
    /// Address to listen on
    #[arg(long, env = "FLIGHT_GATEWAY_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Primary OpenSky-compatible states endpoint
    #[arg(long, env = "FLIGHT_GATEWAY_PRIMARY_URL", default_value = OPENSKY_URL)]
    pub primary_url: String,

    /// Fallback states endpoint
    #[arg(long, env = "FLIGHT_GATEWAY_FALLBACK_URL", default_value = DEMO_URL)]
    pub fallback_url: String,

    /// Primary request timeout in seconds
    #[arg(long, env = "FLIGHT_GATEWAY_PRIMARY_TIMEOUT", default_value_t = OPENSKY_TIMEOUT.as_secs())]
    pub primary_timeout: u64,

    /// Fallback request timeout in seconds
    #[arg(long, env = "FLIGHT_GATEWAY_FALLBACK_TIMEOUT", default_value_t = DEMO_TIMEOUT.as_secs())]
    pub fallback_timeout: u64,
}

impl GatewayArgs {
    #[must_use]
    pub fn primary(&self) -> UpstreamConfig {
        UpstreamConfig {
            url: self.primary_url.clone(),
            timeout: Duration::from_secs(self.primary_timeout),
            source: Source::OpenSky,
        }
    }

    #[must_use]
    pub fn fallback(&self) -> UpstreamConfig {
        UpstreamConfig {
            url: self.fallback_url.clone(),
            timeout: Duration::from_secs(self.fallback_timeout),
            source: Source::Demo,
        }
    }

    /// Build the gateway over two HTTP providers sharing one client.
    pub fn gateway(&self) -> Result<Gateway<HttpUpstream>, ServerError> {
        let client = HttpUpstream::default_client()?;
        Ok(Gateway::new(
            HttpUpstream::new(client.clone(), self.primary()),
            HttpUpstream::new(client, self.fallback()),
        ))
    }
}

/// Routes for the flights endpoint.
pub fn router<U: Upstream + 'static>(gateway: Arc<Gateway<U>>) -> Router {
    Router::new()
        .route(FLIGHTS_PATH, get(flights::<U>))
        .with_state(gateway)
}

async fn flights<U: Upstream + 'static>(
    State(gateway): State<Arc<Gateway<U>>>,
) -> Json<FlightsResponse> {
    Json(gateway.get_flights().await)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving flights on http://{addr}{FLIGHTS_PATH}");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Bind `args.listen` and serve until `shutdown` resolves.
pub async fn run(
    args: &GatewayArgs,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let gateway = Arc::new(args.gateway()?);
    info!(
        "Primary {} ({}s), fallback {} ({}s)",
        args.primary_url, args.primary_timeout, args.fallback_url, args.fallback_timeout
    );
    let listener = TcpListener::bind(args.listen)
        .await
        .map_err(|source| ServerError::Bind {
            addr: args.listen,
            source,
        })?;
    serve(listener, router(gateway), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use flight_feed::UpstreamStates;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Canned(Option<UpstreamStates>, Source);

    impl Upstream for Canned {
        fn source(&self) -> Source {
            self.1
        }

        async fn fetch(&self) -> Result<UpstreamStates, UpstreamError> {
            self.0.clone().ok_or(UpstreamError::Status(503))
        }
    }

    fn states() -> UpstreamStates {
        UpstreamStates {
            time: Some(1_700_000_000),
            states: vec![json!([
                "abc123", "TEST1   ", "Latvia", 1, 1, 24.1, 56.9, 1000.0, false, 200.0, 90.0,
                0.0, null, 1100.0, "1234", false, 0
            ])],
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_flights_snapshot() {
        let gateway = Gateway::new(Canned(Some(states()), Source::OpenSky), Canned(None, Source::Demo));
        let (status, body) = get_json(router(Arc::new(gateway)), FLIGHTS_PATH).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "opensky");
        assert_eq!(body["count"], 1);
        assert_eq!(body["time"], 1_700_000_000);
        assert_eq!(body["flights"][0]["callsign"], "TEST1");
    }

    #[tokio::test]
    async fn test_flights_failure_is_ok_status() {
        let gateway = Gateway::new(Canned(None, Source::OpenSky), Canned(None, Source::Demo));
        let (status, body) = get_json(router(Arc::new(gateway)), FLIGHTS_PATH).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"error": "Failed to fetch flight data from both APIs", "flights": [], "count": 0})
        );
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let gateway = Gateway::new(Canned(None, Source::OpenSky), Canned(None, Source::Demo));
        let response = router(Arc::new(gateway))
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_args_defaults() {
        let args = GatewayArgs::parse_from(["flight-gateway"]);
        assert_eq!(args.primary().url, OPENSKY_URL);
        assert_eq!(args.primary().timeout, Duration::from_secs(15));
        assert_eq!(args.fallback().url, DEMO_URL);
        assert_eq!(args.fallback().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_args_overrides() {
        let args = GatewayArgs::parse_from([
            "flight-gateway",
            "--listen",
            "0.0.0.0:9000",
            "--primary-url",
            "http://localhost:1/states",
            "--fallback-timeout",
            "3",
        ]);
        assert_eq!(args.listen.port(), 9000);
        assert_eq!(args.primary().url, "http://localhost:1/states");
        assert_eq!(args.fallback().timeout, Duration::from_secs(3));
    }
}

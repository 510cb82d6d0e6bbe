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

//! Two-tier flight data gateway.
//!
//! [`Gateway::get_flights`] asks the primary provider first and, on any kind of
//! failure, the fallback provider exactly once. The result is always a
//! [`FlightsResponse`]: provider outages are reported inside the body, never
//! as an error the caller has to handle.

use chrono::Utc;
use log::{error, info, warn};

use crate::state::{normalize_states, FlightSnapshot, FlightsFailure, FlightsResponse};
use crate::upstream::{Upstream, UpstreamError, UpstreamStates};

/// Message returned when the fallback provider answered with an error status.
pub const BOTH_FAILED_MESSAGE: &str = "Failed to fetch flight data from both APIs";

/// Stateless gateway over a primary and a fallback provider.
#[derive(Debug)]
pub struct Gateway<U> {
    primary: U,
    fallback: U,
}

impl<U: Upstream> Gateway<U> {
    #[must_use]
    pub fn new(primary: U, fallback: U) -> Self {
        Self { primary, fallback }
    }

    #[must_use]
    pub fn primary(&self) -> &U {
        &self.primary
    }

    #[must_use]
    pub fn fallback(&self) -> &U {
        &self.fallback
    }

    /// Produce the current snapshot from whichever provider answers.
    ///
    /// The two calls are sequential, so the worst case latency is the sum of
    /// both provider timeouts.
    pub async fn get_flights(&self) -> FlightsResponse {
        match self.primary.fetch().await {
            Ok(states) => return self.snapshot(&self.primary, states),
            Err(e) => warn!(
                "Primary provider {} failed ({}), trying {}",
                self.primary.source(),
                e,
                self.fallback.source()
            ),
        }

        match self.fallback.fetch().await {
            Ok(states) => self.snapshot(&self.fallback, states),
            Err(e) => {
                error!("Fallback provider {} failed: {}", self.fallback.source(), e);
                FlightsResponse::Failure(FlightsFailure::new(failure_message(&e)))
            }
        }
    }

    fn snapshot(&self, upstream: &U, states: UpstreamStates) -> FlightsResponse {
        let flights = normalize_states(&states.states);
        let time = states.time.unwrap_or_else(|| Utc::now().timestamp());

        info!(
            "Serving {} of {} state vectors from {}",
            flights.len(),
            states.states.len(),
            upstream.source()
        );

        FlightsResponse::Snapshot(FlightSnapshot::new(time, upstream.source(), flights))
    }
}

fn failure_message(e: &UpstreamError) -> String {
    match e {
        UpstreamError::Status(_) => BOTH_FAILED_MESSAGE.to_string(),
        other => format!("Error fetching flight data: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Source;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        States(UpstreamStates),
        Status(u16),
        Malformed,
    }

    struct FakeUpstream {
        source: Source,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeUpstream {
        fn new(source: Source, reply: Reply) -> Self {
            Self {
                source,
                reply,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Upstream for FakeUpstream {
        fn source(&self) -> Source {
            self.source
        }

        async fn fetch(&self) -> Result<UpstreamStates, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::States(states) => Ok(states.clone()),
                Reply::Status(code) => Err(UpstreamError::Status(*code)),
                Reply::Malformed => UpstreamStates::from_slice(b"not json"),
            }
        }
    }

    fn states(time: Option<i64>) -> UpstreamStates {
        UpstreamStates {
            time,
            states: vec![
                json!(["a1", "ONE ", "X", 1, 1, 10.0, 20.0, 1000.0, false]),
                json!(["g1", "GND", "X", 1, 1, 10.0, 20.0, 0.0, true]),
            ],
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let gateway = Gateway::new(
            FakeUpstream::new(Source::OpenSky, Reply::States(states(Some(42)))),
            FakeUpstream::new(Source::Demo, Reply::States(states(Some(7)))),
        );

        let response = gateway.get_flights().await;

        assert_eq!(response.source(), Some(Source::OpenSky));
        assert_eq!(response.count(), 1);
        assert_eq!(response.flights()[0].callsign, "ONE");
        assert_eq!(gateway.fallback().calls(), 0);
        let FlightsResponse::Snapshot(snapshot) = response else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.time, 42);
    }

    #[tokio::test]
    async fn test_primary_status_falls_back_once() {
        let gateway = Gateway::new(
            FakeUpstream::new(Source::OpenSky, Reply::Status(503)),
            FakeUpstream::new(Source::Demo, Reply::States(states(Some(7)))),
        );

        let response = gateway.get_flights().await;

        assert_eq!(response.source(), Some(Source::Demo));
        assert_eq!(gateway.primary().calls(), 1);
        assert_eq!(gateway.fallback().calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_malformed_falls_back() {
        let gateway = Gateway::new(
            FakeUpstream::new(Source::OpenSky, Reply::Malformed),
            FakeUpstream::new(Source::Demo, Reply::States(states(None))),
        );

        let before = Utc::now().timestamp();
        let response = gateway.get_flights().await;

        let FlightsResponse::Snapshot(snapshot) = response else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.source, Source::Demo);
        assert!(snapshot.time >= before);
    }

    #[tokio::test]
    async fn test_both_fail_with_status() {
        let gateway = Gateway::new(
            FakeUpstream::new(Source::OpenSky, Reply::Malformed),
            FakeUpstream::new(Source::Demo, Reply::Status(500)),
        );

        let response = gateway.get_flights().await;

        assert_eq!(response.error(), Some(BOTH_FAILED_MESSAGE));
        assert_eq!(response.count(), 0);
        assert!(response.flights().is_empty());
    }

    #[tokio::test]
    async fn test_both_fail_with_error() {
        let gateway = Gateway::new(
            FakeUpstream::new(Source::OpenSky, Reply::Status(429)),
            FakeUpstream::new(Source::Demo, Reply::Malformed),
        );

        let response = gateway.get_flights().await;

        let message = response.error().unwrap();
        assert!(message.starts_with("Error fetching flight data: "));
        assert_eq!(response.count(), 0);
    }
}

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

//! Periodic polling of the gateway's flight endpoint.
//!
//! [`Poller`] fires one request per interval without waiting for earlier
//! requests to finish, up to [`PollerConfig::max_in_flight`] outstanding
//! requests; ticks beyond that are skipped. Every response is tagged with the sequence number of
//! the tick that issued it so the consumer can discard ones that were
//! overtaken by a newer poll.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::state::NormalizedFlight;
use crate::upstream::USER_AGENT;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// What a successful poll carried.
#[derive(Debug, Clone, PartialEq)]
pub enum PollPayload {
    Flights(Vec<NormalizedFlight>),
    /// The body had no `flights` array. Not an update.
    Missing,
}

/// Result of one poll, tagged with the tick that issued it.
#[derive(Debug)]
pub struct PollOutcome {
    pub seq: u64,
    pub result: Result<PollPayload, PollError>,
}

/// Classify a gateway body.
///
/// An empty `flights` array is a valid update that clears the map. Entries
/// that do not look like flights are skipped.
#[must_use]
pub fn interpret_body(body: &Value) -> PollPayload {
    let Some(entries) = body.get("flights").and_then(Value::as_array) else {
        return PollPayload::Missing;
    };
    let flights = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<NormalizedFlight>(entry.clone()) {
            Ok(flight) => Some(flight),
            Err(e) => {
                warn!("Skipping unreadable flight entry: {e}");
                None
            }
        })
        .collect();
    PollPayload::Flights(flights)
}

/// HTTP client for the gateway endpoint.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    url: String,
    timeout: Option<Duration>,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PollError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<PollPayload, PollError> {
        let mut request = self.client.get(&self.url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(interpret_body(&body))
    }
}

/// Requests allowed to be outstanding at once unless configured otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 2;

/// Where and how often to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub url: String,
    pub interval: Duration,
    /// Per-request timeout; `None` waits as long as the transport does.
    pub request_timeout: Option<Duration>,
    /// Ticks are skipped while this many requests are outstanding. Treated
    /// as at least one.
    pub max_in_flight: usize,
}

/// Handle to a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct Poller {
    cancel_token: CancellationToken,
}

impl Poller {
    /// Start polling on `handle`. The first request goes out immediately.
    ///
    /// `sink` is called from runtime worker threads with each outcome, in
    /// completion order.
    pub fn spawn<F>(handle: &tokio::runtime::Handle, config: PollerConfig, sink: F) -> Result<Self, PollError>
    where
        F: Fn(PollOutcome) + Send + Sync + 'static,
    {
        let client = GatewayClient::new(config.url, config.request_timeout)?;
        let interval = config.interval.max(Duration::from_millis(1));
        let cancel_token = CancellationToken::new();
        info!("Polling {} every {:?}", client.url(), interval);
        handle.spawn(poll_loop(
            Arc::new(client),
            interval,
            config.max_in_flight.max(1),
            Arc::new(sink),
            cancel_token.clone(),
        ));
        Ok(Self { cancel_token })
    }

    /// Stop issuing polls and abandon requests in flight.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn poll_loop<F>(
    client: Arc<GatewayClient>,
    interval: Duration,
    max_in_flight: usize,
    sink: Arc<F>,
    cancel_token: CancellationToken,
) where
    F: Fn(PollOutcome) + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(Semaphore::new(max_in_flight));
    let mut seq: u64 = 0;
    let mut skipped: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = cancel_token.cancelled() => {
                info!("Polling stopped after {seq} requests ({skipped} ticks skipped)");
                return;
            }
        }

        let Ok(permit) = Arc::clone(&in_flight).try_acquire_owned() else {
            skipped += 1;
            warn!("Skipping poll: {max_in_flight} requests still outstanding");
            continue;
        };

        seq += 1;
        let client = Arc::clone(&client);
        let sink = Arc::clone(&sink);
        let cancel = cancel_token.clone();
        tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                result = client.fetch() => sink(PollOutcome { seq, result }),
                () = cancel.cancelled() => debug!("Abandoned poll {seq}"),
            }
        });
    }
}

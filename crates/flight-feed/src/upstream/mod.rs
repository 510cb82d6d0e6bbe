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

//! Upstream state-vector providers.
//!
//! A provider answers a plain HTTP GET with `{ "time": ..., "states": [...] }`.
//! The [`Upstream`] trait is the seam the gateway is written against, and
//! [`HttpUpstream`] is its reqwest-backed implementation.

use std::future::Future;
use std::time::Duration;

use log::debug;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::state::{as_integer, Source};

/// OpenSky Network endpoint returning every current state vector.
pub const OPENSKY_URL: &str = "https://opensky-network.org/api/states/all";

/// Demo mirror with the same response shape as OpenSky.
pub const DEMO_URL: &str = "https://deskplan.lv/flight/all.json";

/// Timeout for the primary provider.
pub const OPENSKY_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the fallback provider.
pub const DEMO_TIMEOUT: Duration = Duration::from_secs(10);

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur while fetching from a provider.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection failure, timeout, or an interrupted body.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decoded provider response. State vectors stay untyped until normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpstreamStates {
    /// Epoch seconds at which the provider took the snapshot.
    ///
    /// Integral floats are accepted; an unreadable value is treated as absent.
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: Option<i64>,
    /// Positional state vectors; `null` from the provider means none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub states: Vec<Value>,
}

impl UpstreamStates {
    /// Decode a provider response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, UpstreamError> {
        Ok(serde_json::from_slice(body)?)
    }
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let time = value.as_ref().and_then(as_integer);
    if time.is_none() {
        if let Some(value) = value.filter(|v| !v.is_null()) {
            debug!("Ignoring unreadable provider time {value}");
        }
    }
    Ok(time)
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A provider of raw state vectors.
pub trait Upstream: Send + Sync {
    /// Tag attached to snapshots this provider produced.
    fn source(&self) -> Source;

    /// Fetch the provider's current state vectors.
    fn fetch(&self) -> impl Future<Output = Result<UpstreamStates, UpstreamError>> + Send;
}

/// Configuration for an HTTP provider.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout: Duration,
    pub source: Source,
}

impl UpstreamConfig {
    /// The OpenSky Network with its default timeout.
    #[must_use]
    pub fn opensky() -> Self {
        Self {
            url: OPENSKY_URL.to_string(),
            timeout: OPENSKY_TIMEOUT,
            source: Source::OpenSky,
        }
    }

    /// The demo mirror with its default timeout.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            url: DEMO_URL.to_string(),
            timeout: DEMO_TIMEOUT,
            source: Source::Demo,
        }
    }
}

/// Provider reached over plain HTTP GET without authentication.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl HttpUpstream {
    /// Create a provider that shares `client`'s connection pool.
    #[must_use]
    pub fn new(client: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { client, config }
    }

    /// Build the shared HTTP client used for all providers.
    pub fn default_client() -> Result<reqwest::Client, UpstreamError> {
        Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
    }

    #[must_use]
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }
}

impl Upstream for HttpUpstream {
    fn source(&self) -> Source {
        self.config.source
    }

    async fn fetch(&self) -> Result<UpstreamStates, UpstreamError> {
        debug!("Fetching {} state vectors from {}", self.config.source, self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        UpstreamStates::from_slice(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_states() {
        let states = UpstreamStates::from_slice(br#"{"time": 1700000000, "states": [["abc"], ["def"]]}"#).unwrap();
        assert_eq!(states.time, Some(1_700_000_000));
        assert_eq!(states.states.len(), 2);
    }

    #[test]
    fn test_decode_float_time() {
        let states =
            UpstreamStates::from_slice(br#"{"time": 1700000000.0, "states": [["abc"]]}"#).unwrap();
        assert_eq!(states.time, Some(1_700_000_000));
        assert_eq!(states.states.len(), 1);
    }

    #[test]
    fn test_decode_unreadable_time_is_absent() {
        for body in [
            br#"{"time": 1700000000.5, "states": []}"#.as_slice(),
            br#"{"time": "yesterday", "states": []}"#.as_slice(),
            br#"{"time": null, "states": []}"#.as_slice(),
        ] {
            let states = UpstreamStates::from_slice(body).unwrap();
            assert_eq!(states.time, None);
        }
    }

    #[test]
    fn test_decode_null_states() {
        let states = UpstreamStates::from_slice(br#"{"time": 1700000000, "states": null}"#).unwrap();
        assert!(states.states.is_empty());
    }

    #[test]
    fn test_decode_missing_fields() {
        let states = UpstreamStates::from_slice(b"{}").unwrap();
        assert_eq!(states, UpstreamStates::default());
    }

    #[test]
    fn test_decode_malformed() {
        let err = UpstreamStates::from_slice(b"<html>503</html>").unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[test]
    fn test_default_configs() {
        let primary = UpstreamConfig::opensky();
        assert_eq!(primary.source, Source::OpenSky);
        assert_eq!(primary.timeout, Duration::from_secs(15));

        let fallback = UpstreamConfig::demo();
        assert_eq!(fallback.source, Source::Demo);
        assert_eq!(fallback.timeout, Duration::from_secs(10));
    }
}

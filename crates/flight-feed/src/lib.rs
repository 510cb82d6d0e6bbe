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

//! Live aircraft state vectors, from upstream provider to map marker.
//!
//! The crate is split into layers that can be used on their own:
//!
//! - **State layer**: positional state vectors from the OpenSky-style
//!   `states` array, and the normalized flight record derived from them
//! - **Upstream/gateway layer**: fetch a snapshot from a primary provider,
//!   falling back once to a second provider on any failure
//! - **Sync layer**: reconcile a marker set on an abstract map surface
//!   against successive snapshots, with interpolated movement
//! - **Poll layer**: periodic requests to the gateway endpoint feeding the
//!   sync layer
//!
//! # Gateway
//!
//! ```no_run
//! use flight_feed::{Gateway, HttpUpstream, UpstreamConfig};
//!
//! # async fn run() -> Result<(), flight_feed::UpstreamError> {
//! let client = HttpUpstream::default_client()?;
//! let gateway = Gateway::new(
//!     HttpUpstream::new(client.clone(), UpstreamConfig::opensky()),
//!     HttpUpstream::new(client, UpstreamConfig::demo()),
//! );
//! let response = gateway.get_flights().await;
//! println!("{} flights", response.count());
//! # Ok(())
//! # }
//! ```
//!
//! # Normalizing State Vectors
//!
//! ```
//! use flight_feed::normalize_states;
//! use serde_json::json;
//!
//! let states = vec![
//!     json!(["abc123", "TEST1   ", "X", 1, 1, 2.0, 1.0, 1000.0, false, 200.0, 90.0, 0.0, null, 1100.0, "1234", false, 0]),
//!     json!(["def456", "TEST2", "X", 1, 1, 2.0, 1.0, 0.0, true, 0.0, 0.0, 0.0, null, 0.0, null, false, 0]),
//! ];
//! let flights = normalize_states(&states);
//! assert_eq!(flights.len(), 1);
//! assert_eq!(flights[0].callsign, "TEST1");
//! ```

pub mod gateway;
pub mod poll;
pub mod state;
pub mod sync;
pub mod upstream;

pub use gateway::{Gateway, BOTH_FAILED_MESSAGE};
pub use poll::{
    GatewayClient, PollError, PollOutcome, PollPayload, Poller, PollerConfig, DEFAULT_MAX_IN_FLIGHT,
};
pub use state::{
    normalize_state, normalize_states, FlightSnapshot, FlightsFailure, FlightsResponse,
    NormalizedFlight, PositionSource, RawStateVector, Source, StateVectorError,
};
pub use sync::{
    sync, LatLng, MapSurface, MapSyncClient, MarkerIcon, MarkerRegistry, SyncConfig, SyncStats,
};
pub use upstream::{HttpUpstream, Upstream, UpstreamConfig, UpstreamError, UpstreamStates};

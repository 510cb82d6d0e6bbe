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

//! Lifecycle of a map view that follows the gateway.
//!
//! ```text
//! Uninitialized --initialize--> MapReady --start_polling--> Polling --stop_polling--> Stopped
//! ```
//!
//! There is no error state. A failed poll is logged and the markers from the
//! last successful poll stay on the map until a later poll succeeds.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::animation::{Animator, ANIMATION_DURATION, ANIMATION_TICK};
use super::{sync, LatLng, MapSurface, MarkerRegistry, SyncStats};
use crate::poll::{PollOutcome, PollPayload};

/// How often the gateway is polled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default tile server, rotating over the `a`, `b`, and `c` subdomains.
pub const OSM_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Initial camera position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: LatLng,
    pub zoom: f32,
}

impl Default for MapView {
    /// A global view that fits most of the inhabited world.
    fn default() -> Self {
        Self {
            center: LatLng::new(20.0, 0.0),
            zoom: 3.0,
        }
    }
}

/// Base tile layer served from a `{s}/{z}/{x}/{y}` URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayerSpec {
    pub url_template: String,
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileLayerSpec {
    fn default() -> Self {
        Self {
            url_template: OSM_TILE_URL.to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            max_zoom: 19,
        }
    }
}

/// Timing of the poll and animation loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub animation_duration: Duration,
    pub animation_tick: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            animation_duration: ANIMATION_DURATION,
            animation_tick: ANIMATION_TICK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    MapReady,
    Polling,
    Stopped,
}

/// Keeps a [`MapSurface`] consistent with the latest poll.
///
/// All mutation happens through `&mut self` on one thread; polls are
/// delivered to [`Self::apply`] as [`PollOutcome`]s by whoever runs the
/// timer.
pub struct MapSyncClient<S: MapSurface> {
    state: ClientState,
    surface: S,
    registry: MarkerRegistry<S::Handle>,
    animator: Animator<S::Handle>,
    config: SyncConfig,
    last_applied: Option<u64>,
}

impl<S: MapSurface> std::fmt::Debug for MapSyncClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSyncClient")
            .field("state", &self.state)
            .field("markers", &self.registry.len())
            .field("animations", &self.animator.len())
            .field("last_applied", &self.last_applied)
            .finish_non_exhaustive()
    }
}

impl<S: MapSurface> MapSyncClient<S> {
    #[must_use]
    pub fn new(surface: S, config: SyncConfig) -> Self {
        Self {
            state: ClientState::Uninitialized,
            surface,
            registry: MarkerRegistry::new(),
            animator: Animator::new(config.animation_duration),
            config,
            last_applied: None,
        }
    }

    /// Centre the map and add its base layer. Only valid once.
    pub fn initialize(&mut self, view: MapView, tiles: TileLayerSpec) -> bool {
        if self.state != ClientState::Uninitialized {
            warn!("Map already initialized (state {:?})", self.state);
            return false;
        }
        info!(
            "Initializing map at {:.2}, {:.2} zoom {}",
            view.center.lat, view.center.lng, view.zoom
        );
        self.surface.set_view(view.center, view.zoom);
        self.surface.add_tile_layer(tiles);
        self.state = ClientState::MapReady;
        true
    }

    /// Begin accepting poll outcomes.
    pub fn start_polling(&mut self) -> bool {
        if self.state != ClientState::MapReady {
            warn!("Cannot start polling from state {:?}", self.state);
            return false;
        }
        info!("Starting auto-refresh every {:?}", self.config.poll_interval);
        self.state = ClientState::Polling;
        true
    }

    /// Stop accepting poll outcomes. Markers stay where they are.
    pub fn stop_polling(&mut self) {
        if self.state != ClientState::Stopped {
            info!("Stopping auto-refresh");
            self.state = ClientState::Stopped;
        }
    }

    /// Apply one poll to the map.
    ///
    /// Outcomes that arrive while not polling, that are not newer than the
    /// last applied poll, that failed, or whose body had no flight list leave
    /// the markers untouched and return `None`.
    pub fn apply(&mut self, outcome: PollOutcome, now: Instant) -> Option<SyncStats> {
        if self.state != ClientState::Polling {
            debug!("Ignoring poll {} in state {:?}", outcome.seq, self.state);
            return None;
        }
        if self.last_applied.is_some_and(|last| outcome.seq <= last) {
            debug!("Discarding poll {} superseded by an applied newer poll", outcome.seq);
            return None;
        }

        match outcome.result {
            Err(e) => {
                error!("Error fetching flights: {e}");
                None
            }
            Ok(PollPayload::Missing) => {
                warn!("No flights in response");
                None
            }
            Ok(PollPayload::Flights(flights)) => {
                info!("Updating {} flights", flights.len());
                self.last_applied = Some(outcome.seq);
                Some(sync(
                    &mut self.registry,
                    &mut self.surface,
                    &mut self.animator,
                    &flights,
                    now,
                ))
            }
        }
    }

    /// Advance marker animations. Returns how many are still running.
    pub fn animate(&mut self, now: Instant) -> usize {
        self.animator.tick(&mut self.surface, now)
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        !self.animator.is_idle()
    }

    #[must_use]
    pub fn state(&self) -> ClientState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Access the surface for view changes such as panning.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    #[must_use]
    pub fn registry(&self) -> &MarkerRegistry<S::Handle> {
        &self.registry
    }
}

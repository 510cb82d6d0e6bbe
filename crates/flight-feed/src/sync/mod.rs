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

//! Incremental reconciliation of map markers against flight snapshots.
//!
//! The map itself is an external collaborator reached through [`MapSurface`].
//! This module owns only the bookkeeping: which identifier maps to which
//! marker, what each marker last showed, and how to move a marker set from
//! one snapshot to the next with the fewest marker operations.

pub mod animation;
pub mod client;
pub mod format;

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::time::Instant;

use log::info;

use crate::state::NormalizedFlight;

pub use animation::{Animator, PositionAnimation, ANIMATION_DURATION, ANIMATION_TICK};
pub use client::{ClientState, MapSyncClient, MapView, SyncConfig, TileLayerSpec, OSM_TILE_URL, POLL_INTERVAL};
pub use format::{compass_point, popup_content, PopupContent, PopupRow};

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Linear interpolation towards `to`; `t` is not clamped.
    #[must_use]
    pub fn lerp(self, to: LatLng, t: f64) -> LatLng {
        LatLng {
            lat: self.lat + (to.lat - self.lat) * t,
            lng: self.lng + (to.lng - self.lng) * t,
        }
    }
}

impl From<&NormalizedFlight> for LatLng {
    fn from(flight: &NormalizedFlight) -> Self {
        Self::new(flight.latitude, flight.longitude)
    }
}

/// Visual marker style. Only the aircraft heading varies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MarkerIcon {
    /// Track angle in degrees, if known.
    pub heading: Option<f64>,
}

impl MarkerIcon {
    #[must_use]
    pub fn for_flight(flight: &NormalizedFlight) -> Self {
        Self {
            heading: flight.heading,
        }
    }
}

/// Rendering collaborator: a map that can place and edit markers.
///
/// Implementations own projection and drawing; callers only deal in
/// geographic positions and opaque handles.
pub trait MapSurface {
    /// Identifies one marker on this surface.
    type Handle: Clone + Eq + Debug;

    /// Centre the view on `center` at `zoom`.
    fn set_view(&mut self, center: LatLng, zoom: f32);

    /// Add the base tile layer.
    fn add_tile_layer(&mut self, tiles: TileLayerSpec);

    fn add_marker(&mut self, position: LatLng, icon: MarkerIcon, popup: PopupContent) -> Self::Handle;

    fn remove_marker(&mut self, handle: &Self::Handle);

    /// Currently displayed position, which may be mid-animation.
    fn marker_position(&self, handle: &Self::Handle) -> Option<LatLng>;

    fn set_marker_position(&mut self, handle: &Self::Handle, position: LatLng);

    fn set_marker_icon(&mut self, handle: &Self::Handle, icon: MarkerIcon);

    fn set_popup_content(&mut self, handle: &Self::Handle, popup: PopupContent);
}

/// A marker currently on the map and the flight it last displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEntry<H> {
    pub marker: H,
    pub flight: NormalizedFlight,
}

/// Live mapping from `icao24` to marker, persisting across polls.
#[derive(Debug, Clone)]
pub struct MarkerRegistry<H> {
    entries: HashMap<String, MarkerEntry<H>>,
}

impl<H> Default for MarkerRegistry<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<H> MarkerRegistry<H> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, icao24: &str) -> Option<&MarkerEntry<H>> {
        self.entries.get(icao24)
    }

    #[must_use]
    pub fn contains(&self, icao24: &str) -> bool {
        self.entries.contains_key(icao24)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers currently on the map, in no particular order.
    pub fn icaos(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MarkerEntry<H>> {
        self.entries.values()
    }
}

/// Marker operations performed by one [`sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Markers on the map afterwards.
    pub total: usize,
}

/// Reconcile `registry` and `surface` with the latest flight list.
///
/// First every marker whose identifier is absent from `flights` is removed,
/// then every flight is upserted: known identifiers animate from their
/// displayed position to the new one and get a fresh icon and popup, unknown
/// identifiers get a new marker. Identifiers are independent, so the order of
/// operations within each pass does not matter.
pub fn sync<S: MapSurface>(
    registry: &mut MarkerRegistry<S::Handle>,
    surface: &mut S,
    animator: &mut Animator<S::Handle>,
    flights: &[NormalizedFlight],
    now: Instant,
) -> SyncStats {
    let mut stats = SyncStats::default();

    let incoming: HashSet<&str> = flights.iter().map(|f| f.icao24.as_str()).collect();
    registry.entries.retain(|icao, entry| {
        if incoming.contains(icao.as_str()) {
            return true;
        }
        surface.remove_marker(&entry.marker);
        animator.forget(&entry.marker);
        stats.removed += 1;
        false
    });

    for flight in flights {
        let target = LatLng::from(flight);
        let icon = MarkerIcon::for_flight(flight);
        let popup = popup_content(flight);

        if let Some(entry) = registry.entries.get_mut(&flight.icao24) {
            let from = surface
                .marker_position(&entry.marker)
                .unwrap_or_else(|| LatLng::from(&entry.flight));
            animator.start(surface, entry.marker.clone(), from, target, now);
            surface.set_marker_icon(&entry.marker, icon);
            surface.set_popup_content(&entry.marker, popup);
            entry.flight = flight.clone();
            stats.updated += 1;
        } else {
            let marker = surface.add_marker(target, icon, popup);
            registry.entries.insert(
                flight.icao24.clone(),
                MarkerEntry {
                    marker,
                    flight: flight.clone(),
                },
            );
            stats.added += 1;
        }
    }

    stats.total = registry.len();
    info!(
        "Update complete: {} added, {} updated, {} removed. Total on map: {}",
        stats.added, stats.updated, stats.removed, stats.total
    );
    stats
}

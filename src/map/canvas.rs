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

//! Marker state behind the map widget.
//!
//! [`MarkerCanvas`] is the [`MapSurface`] the sync client drives. It owns the
//! camera and the markers; drawing happens in the app from this state.

use std::collections::BTreeMap;

use flight_feed::sync::{MapSurface, PopupContent, TileLayerSpec};
use flight_feed::{LatLng, MarkerIcon};

use super::tiles::{WebMercator, TILE_SIZE};

const MIN_ZOOM: f32 = 1.0;
const DEFAULT_MAX_ZOOM: u8 = 19;
/// Click distance in pixels that still selects a marker.
pub const HIT_RADIUS: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: LatLng,
    pub icon: MarkerIcon,
    pub popup: PopupContent,
}

#[derive(Debug)]
pub struct MarkerCanvas {
    markers: BTreeMap<MarkerId, Marker>,
    next_id: u64,
    center: LatLng,
    zoom: f32,
    tiles: Option<TileLayerSpec>,
    selected: Option<MarkerId>,
}

impl Default for MarkerCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerCanvas {
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: BTreeMap::new(),
            next_id: 0,
            center: LatLng::new(0.0, 0.0),
            zoom: MIN_ZOOM,
            tiles: None,
            selected: None,
        }
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        self.center
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[must_use]
    pub fn tile_layer(&self) -> Option<&TileLayerSpec> {
        self.tiles.as_ref()
    }

    fn max_zoom(&self) -> f32 {
        f32::from(self.tiles.as_ref().map_or(DEFAULT_MAX_ZOOM, |t| t.max_zoom))
    }

    pub fn markers(&self) -> impl Iterator<Item = (MarkerId, &Marker)> {
        self.markers.iter().map(|(id, marker)| (*id, marker))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Pixel offset of `position` from the viewport centre.
    ///
    /// Longitude wraps, so the copy of `position` nearest the centre is used.
    #[must_use]
    pub fn project(&self, position: LatLng) -> (f32, f32) {
        let zoom = f64::from(self.zoom);
        let world = TILE_SIZE * 2_f64.powf(zoom);
        let mut dx = (WebMercator::lon_to_x(position.lng, zoom) - WebMercator::lon_to_x(self.center.lng, zoom)) * TILE_SIZE;
        let dy = (WebMercator::lat_to_y(position.lat, zoom) - WebMercator::lat_to_y(self.center.lat, zoom)) * TILE_SIZE;
        if dx > world / 2.0 {
            dx -= world;
        } else if dx < -world / 2.0 {
            dx += world;
        }
        (dx as f32, dy as f32)
    }

    /// Move the camera so the map follows a drag of `(dx, dy)` pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let zoom = f64::from(self.zoom);
        let n = 2_f64.powf(zoom);
        let x = WebMercator::lon_to_x(self.center.lng, zoom) - f64::from(dx) / TILE_SIZE;
        let y = (WebMercator::lat_to_y(self.center.lat, zoom) - f64::from(dy) / TILE_SIZE).clamp(0.0, n);
        self.center = LatLng::new(
            WebMercator::y_to_lat(y, zoom).clamp(-WebMercator::MAX_LATITUDE, WebMercator::MAX_LATITUDE),
            WebMercator::x_to_lon(x.rem_euclid(n), zoom),
        );
    }

    /// Change zoom by `delta` levels, kept within the tile layer's range.
    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, self.max_zoom());
    }

    /// The marker nearest to a point given as an offset from the centre.
    #[must_use]
    pub fn hit_test(&self, offset: (f32, f32)) -> Option<MarkerId> {
        self.markers
            .iter()
            .map(|(id, marker)| {
                let (x, y) = self.project(marker.position);
                (*id, (x - offset.0).hypot(y - offset.1))
            })
            .filter(|(_, distance)| *distance <= HIT_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn select(&mut self, id: Option<MarkerId>) {
        self.selected = id.filter(|id| self.markers.contains_key(id));
    }

    #[must_use]
    pub fn selected(&self) -> Option<(MarkerId, &Marker)> {
        let id = self.selected?;
        self.markers.get(&id).map(|marker| (id, marker))
    }
}

impl MapSurface for MarkerCanvas {
    type Handle = MarkerId;

    fn set_view(&mut self, center: LatLng, zoom: f32) {
        self.center = LatLng::new(
            center.lat.clamp(-WebMercator::MAX_LATITUDE, WebMercator::MAX_LATITUDE),
            center.lng,
        );
        self.zoom = zoom.clamp(MIN_ZOOM, self.max_zoom());
    }

    fn add_tile_layer(&mut self, tiles: TileLayerSpec) {
        self.tiles = Some(tiles);
        self.zoom = self.zoom.clamp(MIN_ZOOM, self.max_zoom());
    }

    fn add_marker(&mut self, position: LatLng, icon: MarkerIcon, popup: PopupContent) -> MarkerId {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.insert(id, Marker { position, icon, popup });
        id
    }

    fn remove_marker(&mut self, handle: &MarkerId) {
        self.markers.remove(handle);
        if self.selected == Some(*handle) {
            self.selected = None;
        }
    }

    fn marker_position(&self, handle: &MarkerId) -> Option<LatLng> {
        self.markers.get(handle).map(|m| m.position)
    }

    fn set_marker_position(&mut self, handle: &MarkerId, position: LatLng) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.position = position;
        }
    }

    fn set_marker_icon(&mut self, handle: &MarkerId, icon: MarkerIcon) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.icon = icon;
        }
    }

    fn set_popup_content(&mut self, handle: &MarkerId, popup: PopupContent) {
        if let Some(marker) = self.markers.get_mut(handle) {
            marker.popup = popup;
        }
    }
}

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

//! Application configuration management.
//!
//! Configuration is persisted as TOML through confy. Missing fields fall back
//! to their defaults so older files keep loading.

use std::time::Duration;

use flight_feed::sync::{MapView, SyncConfig, TileLayerSpec, OSM_TILE_URL};
use flight_feed::LatLng;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "flight-radar";
const CONFIG_NAME: &str = "config";

/// Default gateway endpoint for a locally running flight-gateway.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080/api/flights";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Flights endpoint of the gateway
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Milliseconds between polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Length of a marker's glide to its new position
    #[serde(default = "default_animation_duration_ms")]
    pub animation_duration_ms: u64,

    /// Frame interval while markers are moving
    #[serde(default = "default_animation_tick_ms")]
    pub animation_tick_ms: u64,

    /// Initial map centre latitude
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,

    /// Initial map centre longitude
    #[serde(default)]
    pub default_longitude: f64,

    /// Initial map zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Tile URL with `{s}`, `{z}`, `{x}`, `{y}` placeholders
    #[serde(default = "default_tile_url")]
    pub tile_url_template: String,

    /// Attribution shown in the map corner
    #[serde(default = "default_tile_attribution")]
    pub tile_attribution: String,

    /// Highest zoom level the tile server provides
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_animation_duration_ms() -> u64 {
    4900
}

fn default_animation_tick_ms() -> u64 {
    33
}

fn default_latitude() -> f64 {
    20.0
}

fn default_zoom() -> f32 {
    3.0
}

fn default_tile_url() -> String {
    OSM_TILE_URL.to_string()
}

fn default_tile_attribution() -> String {
    TileLayerSpec::default().attribution
}

fn default_max_zoom() -> u8 {
    19
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            gateway_url: default_gateway_url(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            animation_duration_ms: default_animation_duration_ms(),
            animation_tick_ms: default_animation_tick_ms(),
            default_latitude: default_latitude(),
            default_longitude: 0.0,
            default_zoom: default_zoom(),
            tile_url_template: default_tile_url(),
            tile_attribution: default_tile_attribution(),
            max_zoom: default_max_zoom(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if absent
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    #[must_use]
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            animation_duration: Duration::from_millis(self.animation_duration_ms),
            animation_tick: Duration::from_millis(self.animation_tick_ms.max(1)),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    #[must_use]
    pub fn map_view(&self) -> MapView {
        MapView {
            center: LatLng::new(self.default_latitude, self.default_longitude),
            zoom: self.default_zoom,
        }
    }

    #[must_use]
    pub fn tile_layer(&self) -> TileLayerSpec {
        TileLayerSpec {
            url_template: self.tile_url_template.clone(),
            attribution: self.tile_attribution.clone(),
            max_zoom: self.max_zoom,
        }
    }
}

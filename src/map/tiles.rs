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

//! Slippy-map tiles: projection, download, and on-disk cache.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use egui::{ColorImage, TextureHandle};
use flight_feed::sync::TileLayerSpec;
use flight_feed::LatLng;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: f64 = 256.0;
const CACHE_DURATION_DAYS: u64 = 7;
const SUBDOMAINS: [char; 3] = ['a', 'b', 'c'];
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum TileError {
    #[error("tile request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("tile server returned HTTP {0}")]
    Status(u16),
    #[error("tile cache I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("tile image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Web Mercator projection in tile units, at fractional zoom.
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Latitude beyond which the projection is cut off.
    pub const MAX_LATITUDE: f64 = 85.051_128_78;

    fn tiles_at(zoom: f64) -> f64 {
        2_f64.powf(zoom)
    }

    pub fn lat_to_y(lat: f64, zoom: f64) -> f64 {
        let lat_rad = lat.clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE).to_radians();
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0;
        y * Self::tiles_at(zoom)
    }

    pub fn lon_to_x(lon: f64, zoom: f64) -> f64 {
        ((lon + 180.0) / 360.0) * Self::tiles_at(zoom)
    }

    pub fn y_to_lat(y: f64, zoom: f64) -> f64 {
        let n = Self::tiles_at(zoom);
        let lat_rad = (std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh().atan();
        lat_rad.to_degrees()
    }

    pub fn x_to_lon(x: f64, zoom: f64) -> f64 {
        x / Self::tiles_at(zoom) * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Expand a `{s}/{z}/{x}/{y}` template for this tile.
    pub fn url(&self, template: &str) -> String {
        let subdomain = SUBDOMAINS[((self.x + self.y) % 3) as usize];
        template
            .replace("{s}", &subdomain.to_string())
            .replace("{z}", &self.zoom.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }

    /// Cache file name derived from the tile's URL.
    fn cache_filename(&self, template: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url(template).as_bytes());
        format!("{:x}.png", hasher.finalize())
    }
}

/// A tile to draw and where, relative to the viewport centre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleTile {
    pub coord: TileCoord,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Drawn edge length; differs from [`TILE_SIZE`] at fractional zoom.
    pub size: f32,
}

/// Tiles covering a `width` x `height` viewport centred on `center`.
///
/// Tiles are fetched at the nearest integer zoom not above `max_zoom` and
/// scaled to the requested zoom.
pub fn visible_tiles(center: LatLng, zoom: f32, max_zoom: u8, width: f32, height: f32) -> Vec<VisibleTile> {
    let tile_zoom = zoom.round().clamp(0.0, f32::from(max_zoom)) as u8;
    let scale = 2_f64.powf(f64::from(zoom) - f64::from(tile_zoom));
    let size = TILE_SIZE * scale;

    let center_x = WebMercator::lon_to_x(center.lng, f64::from(tile_zoom));
    let center_y = WebMercator::lat_to_y(center.lat, f64::from(tile_zoom));

    let tiles_wide = (f64::from(width) / size).ceil() as i64 + 2;
    let tiles_high = (f64::from(height) / size).ceil() as i64 + 2;
    let start_x = center_x.floor() as i64 - tiles_wide / 2;
    let start_y = center_y.floor() as i64 - tiles_high / 2;
    let max_tile = 1_i64 << tile_zoom;

    let mut tiles = Vec::new();
    for dy in 0..tiles_high {
        let tile_y = start_y + dy;
        if !(0..max_tile).contains(&tile_y) {
            continue;
        }
        for dx in 0..tiles_wide {
            let tile_x = start_x + dx;
            tiles.push(VisibleTile {
                coord: TileCoord::new(tile_x.rem_euclid(max_tile) as u32, tile_y as u32, tile_zoom),
                offset_x: ((tile_x as f64 - center_x) * size) as f32,
                offset_y: ((tile_y as f64 - center_y) * size) as f32,
                size: size as f32,
            });
        }
    }
    tiles
}

pub enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

type TileMap = Arc<Mutex<HashMap<TileCoord, TileState>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Loads tiles from the disk cache or the tile server, one thread per download.
pub struct TileManager {
    cache_dir: PathBuf,
    url_template: String,
    max_zoom: u8,
    client: reqwest::blocking::Client,
    tiles: TileMap,
    downloads: Arc<Mutex<HashSet<TileCoord>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("cache_dir", &self.cache_dir)
            .field("url_template", &self.url_template)
            .field("max_zoom", &self.max_zoom)
            .finish_non_exhaustive()
    }
}

impl TileManager {
    pub fn new(layer: &TileLayerSpec) -> Result<Self, TileError> {
        let cache_dir = Self::get_cache_dir();
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory {}: {e}", cache_dir.display());
        }
        Self::cleanup_old_tiles(&cache_dir);

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            cache_dir,
            url_template: layer.url_template.clone(),
            max_zoom: layer.max_zoom,
            client,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            downloads: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn get_cache_dir() -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        path.push("flight-radar");
        path.push("tiles");
        path
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);
        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired && fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {removed} expired tiles from cache");
        }
    }

    pub fn visible_tiles(&self, center: LatLng, zoom: f32, width: f32, height: f32) -> Vec<VisibleTile> {
        visible_tiles(center, zoom, self.max_zoom, width, height)
    }

    /// Get a tile from memory or disk, or queue it for download.
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let mut tiles = lock(&self.tiles);
        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => return Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => return None,
            None => {}
        }

        let cache_path = self.cache_dir.join(coord.cache_filename(&self.url_template));
        if cache_path.exists() {
            match fs::read(&cache_path)
                .map_err(TileError::from)
                .and_then(|bytes| load_texture(ctx, coord, &bytes))
            {
                Ok(texture) => {
                    tiles.insert(coord, TileState::Loaded(texture.clone()));
                    return Some(texture);
                }
                Err(e) => warn!("Discarding cached tile {}: {e}", cache_path.display()),
            }
        }

        tiles.insert(coord, TileState::Loading);
        drop(tiles);
        self.queue_download(coord, ctx.clone());
        None
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        if !lock(&self.downloads).insert(coord) {
            return;
        }

        let url = coord.url(&self.url_template);
        let cache_path = self.cache_dir.join(coord.cache_filename(&self.url_template));
        let client = self.client.clone();
        let tiles = Arc::clone(&self.tiles);
        let downloads = Arc::clone(&self.downloads);

        std::thread::spawn(move || {
            debug!("Downloading tile {url}");
            let state = match download_tile(&client, &url, &cache_path)
                .and_then(|bytes| load_texture(&ctx, coord, &bytes))
            {
                Ok(texture) => TileState::Loaded(texture),
                Err(e) => {
                    warn!("Failed to load tile {url}: {e}");
                    TileState::Failed
                }
            };
            lock(&tiles).insert(coord, state);
            lock(&downloads).remove(&coord);
            ctx.request_repaint();
        });
    }

    pub fn has_loading_tiles(&self) -> bool {
        lock(&self.tiles).values().any(|state| matches!(state, TileState::Loading))
    }

    pub fn get_error_count(&self) -> usize {
        lock(&self.tiles)
            .values()
            .filter(|state| matches!(state, TileState::Failed))
            .count()
    }
}

fn download_tile(client: &reqwest::blocking::Client, url: &str, cache_path: &Path) -> Result<Vec<u8>, TileError> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(TileError::Status(status.as_u16()));
    }
    let bytes = response.bytes()?.to_vec();
    if let Err(e) = fs::write(cache_path, &bytes) {
        warn!("Failed to save tile to cache: {e}");
    }
    Ok(bytes)
}

fn load_texture(ctx: &egui::Context, coord: TileCoord, bytes: &[u8]) -> Result<TextureHandle, TileError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
    Ok(ctx.load_texture(
        format!("tile_{}_{}/{}", coord.zoom, coord.x, coord.y),
        color_image,
        egui::TextureOptions::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flight_feed::sync::OSM_TILE_URL;

    #[test]
    fn test_url_template_expansion() {
        let url = TileCoord::new(3, 5, 4).url(OSM_TILE_URL);
        assert_eq!(url, "https://c.tile.openstreetmap.org/4/3/5.png");
        assert_eq!(
            TileCoord::new(1, 0, 1).url(OSM_TILE_URL),
            "https://b.tile.openstreetmap.org/1/1/0.png"
        );
    }

    #[test]
    fn test_cache_filename_per_url() {
        let a = TileCoord::new(3, 5, 4).cache_filename(OSM_TILE_URL);
        let b = TileCoord::new(3, 5, 4).cache_filename(OSM_TILE_URL);
        let other = TileCoord::new(3, 5, 4).cache_filename("https://tiles.example/{z}/{x}/{y}.png");
        assert_eq!(a, b);
        assert_ne!(a, other);
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn test_mercator_inverse() {
        for (lat, lon) in [(0.0, 0.0), (56.95, 24.1), (-33.9, 151.2), (20.0, -179.5)] {
            let y = WebMercator::lat_to_y(lat, 5.5);
            let x = WebMercator::lon_to_x(lon, 5.5);
            assert!((WebMercator::y_to_lat(y, 5.5) - lat).abs() < 1e-9);
            assert!((WebMercator::x_to_lon(x, 5.5) - lon).abs() < 1e-9);
        }
        assert!((WebMercator::lat_to_y(0.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((WebMercator::lat_to_y(90.0, 0.0) - WebMercator::lat_to_y(89.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_visible_tiles_wrap_longitude() {
        let tiles = visible_tiles(LatLng::new(0.0, 179.9), 2.0, 19, 512.0, 512.0);
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.coord.zoom == 2 && t.coord.x < 4 && t.coord.y < 4));
        assert!(tiles.iter().any(|t| t.coord.x == 0 && t.offset_x > 0.0));
    }

    #[test]
    fn test_visible_tiles_fractional_zoom() {
        let tiles = visible_tiles(LatLng::new(20.0, 0.0), 3.4, 19, 800.0, 600.0);
        let tile = tiles[0];
        assert_eq!(tile.coord.zoom, 3);
        let expected = (TILE_SIZE * 2_f64.powf(0.4)) as f32;
        assert!((tile.size - expected).abs() < 0.01);
    }

    #[test]
    fn test_visible_tiles_respect_max_zoom() {
        let tiles = visible_tiles(LatLng::new(0.0, 0.0), 5.0, 3, 256.0, 256.0);
        assert!(tiles.iter().all(|t| t.coord.zoom == 3));
        assert!((tiles[0].size - 1024.0).abs() < 0.01);
    }
}

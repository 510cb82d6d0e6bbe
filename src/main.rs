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

mod app;
mod config;
mod map;

use clap::Parser;
use eframe::egui;
use log::{error, info, warn};

use app::RadarApp;
use config::AppConfig;

/// Live world flight map.
#[derive(Debug, Parser)]
#[command(name = "flight-radar", version, about)]
struct Args {
    /// Gateway flights endpoint
    #[arg(long)]
    gateway_url: Option<String>,

    /// Milliseconds between polls
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Initial map centre latitude
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Initial map centre longitude
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Initial zoom level
    #[arg(long)]
    zoom: Option<f32>,

    /// Write the resulting configuration back to disk
    #[arg(long)]
    save: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(ref url) = self.gateway_url {
            config.gateway_url.clone_from(url);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval_ms = interval;
        }
        if let Some(lat) = self.lat {
            config.default_latitude = lat;
        }
        if let Some(lon) = self.lon {
            config.default_longitude = lon;
        }
        if let Some(zoom) = self.zoom {
            config.default_zoom = zoom;
        }
    }
}

fn create_app(
    cc: &eframe::CreationContext<'_>,
    config: &AppConfig,
) -> Result<Box<dyn eframe::App>, Box<dyn std::error::Error + Send + Sync>> {
    Ok(Box::new(RadarApp::new(cc, config)?))
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration ({e}), using defaults");
        AppConfig::default()
    });
    args.apply(&mut config);

    if args.save {
        match config.save() {
            Ok(()) => info!("Configuration saved"),
            Err(e) => error!("Failed to save configuration: {e}"),
        }
    }
    if let Ok(path) = AppConfig::get_config_path() {
        info!("Configuration file: {}", path.display());
    }
    info!("Polling {} every {} ms", config.gateway_url, config.poll_interval_ms);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("Flight Radar"),
        ..Default::default()
    };

    eframe::run_native(
        "Flight Radar",
        options,
        Box::new(move |cc| create_app(cc, &config)),
    )
}

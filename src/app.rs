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

//! The live flight map window.

use std::sync::mpsc;
use std::time::Instant;

use eframe::egui;
use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, RichText, Shape, Stroke, Vec2};
use flight_feed::poll::{PollError, PollOutcome, Poller, PollerConfig, DEFAULT_MAX_IN_FLIGHT};
use flight_feed::sync::MapSyncClient;
use flight_feed::SyncStats;
use log::info;
use thiserror::Error;

use crate::config::AppConfig;
use crate::map::tiles::TileError;
use crate::map::{MarkerCanvas, TileManager};

/// Pixels of scroll that change zoom by one level.
const SCROLL_PER_ZOOM_LEVEL: f32 = 200.0;
const WATER: Color32 = Color32::from_rgb(170, 211, 223);
const MARKER_FILL: Color32 = Color32::from_rgb(30, 90, 200);
const MARKER_SELECTED: Color32 = Color32::from_rgb(230, 60, 60);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to create gateway client: {0}")]
    Gateway(#[from] PollError),
    #[error("failed to create tile manager: {0}")]
    Tiles(#[from] TileError),
}

pub struct RadarApp {
    // Declared before the runtime so polling stops before the runtime shuts down.
    poller: Poller,
    _runtime: tokio::runtime::Runtime,
    outcomes: mpsc::Receiver<PollOutcome>,
    client: MapSyncClient<MarkerCanvas>,
    tile_manager: TileManager,
    last_stats: Option<SyncStats>,
    last_error: Option<String>,
    tile_status: Option<String>,
}

impl RadarApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &AppConfig) -> Result<Self, AppError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("flight-poll")
            .enable_all()
            .build()?;
        let tile_manager = TileManager::new(&config.tile_layer())?;

        let mut client = MapSyncClient::new(MarkerCanvas::new(), config.sync_config());
        client.initialize(config.map_view(), config.tile_layer());
        client.start_polling();

        let (tx, outcomes) = mpsc::channel();
        let ctx = cc.egui_ctx.clone();
        let poll_config = PollerConfig {
            url: config.gateway_url.clone(),
            interval: client.config().poll_interval,
            request_timeout: config.request_timeout(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        };
        let poller = Poller::spawn(runtime.handle(), poll_config, move |outcome| {
            if tx.send(outcome).is_ok() {
                ctx.request_repaint();
            }
        })?;

        Ok(Self {
            poller,
            _runtime: runtime,
            outcomes,
            client,
            tile_manager,
            last_stats: None,
            last_error: None,
            tile_status: None,
        })
    }

    fn drain_outcomes(&mut self, now: Instant) {
        while let Ok(outcome) = self.outcomes.try_recv() {
            let failure = outcome.result.as_ref().err().map(ToString::to_string);
            if let Some(stats) = self.client.apply(outcome, now) {
                self.last_stats = Some(stats);
                self.last_error = None;
            } else if let Some(e) = failure {
                self.last_error = Some(e);
            }
        }
    }

    fn draw_map(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let rect = response.rect;
        let center = rect.center();
        painter.rect_filled(rect, 0.0, WATER);

        if response.dragged() {
            let delta = response.drag_delta();
            self.client.surface_mut().pan(delta.x, delta.y);
        }
        if response.hovered() {
            let (zoom_delta, scroll) = ui.ctx().input(|i| (i.zoom_delta(), i.smooth_scroll_delta.y));
            let levels = zoom_delta.log2() + scroll / SCROLL_PER_ZOOM_LEVEL;
            if levels.abs() > 0.001 {
                self.client.surface_mut().zoom_by(levels);
            }
        }

        let canvas = self.client.surface();

        let mut tiles_rendered = 0;
        for tile in self.tile_manager.visible_tiles(canvas.center(), canvas.zoom(), rect.width(), rect.height()) {
            if let Some(texture) = self.tile_manager.get_tile(tile.coord, ui.ctx()) {
                let tile_rect = Rect::from_min_size(
                    center + Vec2::new(tile.offset_x, tile.offset_y),
                    Vec2::splat(tile.size),
                );
                painter.image(
                    texture.id(),
                    tile_rect,
                    Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                    Color32::WHITE,
                );
                tiles_rendered += 1;
            }
        }

        let errors = self.tile_manager.get_error_count();
        if errors > 0 {
            self.tile_status = Some(format!("Failed to load {errors} tiles"));
        } else if self.tile_manager.has_loading_tiles() {
            self.tile_status = Some("Loading map tiles...".to_string());
        } else if tiles_rendered > 0 {
            self.tile_status = None;
        }

        let selected = canvas.selected().map(|(id, _)| id);
        let visible = rect.expand(20.0);
        for (id, marker) in canvas.markers() {
            let (dx, dy) = canvas.project(marker.position);
            let pos = center + Vec2::new(dx, dy);
            if visible.contains(pos) {
                draw_aircraft(&painter, pos, marker.icon.heading, selected == Some(id));
            }
        }

        let clicked = if response.clicked() {
            response.interact_pointer_pos().map(|p| {
                let offset = p - center;
                canvas.hit_test((offset.x, offset.y))
            })
        } else {
            None
        };

        if let Some(attribution) = canvas.tile_layer().map(|t| t.attribution.clone()) {
            draw_label(
                &painter,
                rect.right_bottom() + Vec2::new(-6.0, -6.0),
                Align2::RIGHT_BOTTOM,
                &attribution,
                10.0,
            );
        }
        let status = if canvas.is_empty() && self.last_stats.is_none() && self.last_error.is_none() {
            "Waiting for flight data".to_owned()
        } else {
            self.status_line(canvas.len())
        };
        draw_label(&painter, rect.left_top() + Vec2::new(10.0, 10.0), Align2::LEFT_TOP, &status, 12.0);

        if let Some(ref message) = self.tile_status {
            draw_label(&painter, rect.center_top() + Vec2::new(0.0, 12.0), Align2::CENTER_TOP, message, 12.0);
        }

        if let Some(hit) = clicked {
            self.client.surface_mut().select(hit);
        }
    }

    fn status_line(&self, total: usize) -> String {
        let mut line = format!("{total} aircraft");
        if let Some(stats) = self.last_stats {
            line.push_str(&format!(
                " | +{} ~{} -{}",
                stats.added, stats.updated, stats.removed
            ));
        }
        if let Some(ref error) = self.last_error {
            line.push_str(&format!(" | {error}"));
        }
        line
    }

    fn draw_popup(&mut self, ctx: &egui::Context) {
        let Some((_, marker)) = self.client.surface().selected() else {
            return;
        };
        let popup = marker.popup.clone();

        let mut open = true;
        egui::Window::new(RichText::new(&popup.title).strong())
            .id(egui::Id::new("flight_popup"))
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::RIGHT_TOP, Vec2::new(-10.0, 10.0))
            .show(ctx, |ui| {
                egui::Grid::new("flight_popup_rows")
                    .num_columns(2)
                    .striped(true)
                    .show(ui, |ui| {
                        for row in &popup.rows {
                            ui.label(RichText::new(row.label).strong());
                            ui.label(RichText::new(row.value.as_str()).monospace());
                            ui.end_row();
                        }
                    });
            });

        if !open {
            self.client.surface_mut().select(None);
        }
    }
}

impl eframe::App for RadarApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.drain_outcomes(now);
        self.client.animate(now);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.draw_map(ui);
            });
        self.draw_popup(ctx);

        let config = self.client.config();
        ctx.request_repaint_after(if self.client.is_animating() {
            config.animation_tick
        } else {
            config.poll_interval
        });
    }
}

impl Drop for RadarApp {
    fn drop(&mut self) {
        self.client.stop_polling();
        self.poller.stop();
        info!("Stopped flight updates");
    }
}

/// Aircraft glyph: a triangle pointing along the heading, or a dot without one.
fn draw_aircraft(painter: &Painter, pos: Pos2, heading: Option<f64>, selected: bool) {
    let fill = if selected { MARKER_SELECTED } else { MARKER_FILL };
    let stroke = Stroke::new(1.0, Color32::WHITE);

    let Some(heading) = heading else {
        painter.circle(pos, 5.0, fill, stroke);
        return;
    };

    let (sin, cos) = (heading.to_radians() as f32).sin_cos();
    let rotate = |x: f32, y: f32| pos + Vec2::new(x * cos - y * sin, x * sin + y * cos);
    painter.add(Shape::convex_polygon(
        vec![rotate(0.0, -10.0), rotate(6.0, 8.0), rotate(-6.0, 8.0)],
        fill,
        stroke,
    ));
}

fn draw_label(painter: &Painter, pos: Pos2, anchor: Align2, text: &str, size: f32) {
    let font = FontId::proportional(size);
    let galley = painter.layout_no_wrap(text.to_string(), font.clone(), Color32::WHITE);
    let padding = Vec2::new(6.0, 3.0);
    let text_rect = anchor.anchor_size(pos, galley.size());
    painter.rect_filled(text_rect.expand2(padding), 3.0, Color32::from_black_alpha(170));
    painter.text(pos, anchor, text, font, Color32::WHITE);
}

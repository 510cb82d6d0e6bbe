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

//! Human-readable popup fields for a flight marker.

use crate::state::NormalizedFlight;

/// Placeholder for any value that is missing.
pub const NOT_AVAILABLE: &str = "N/A";

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
];

/// One labelled line of a popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRow {
    pub label: &'static str,
    pub value: String,
}

/// Content bound to a marker's popup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PopupContent {
    /// Callsign of the aircraft.
    pub title: String,
    pub rows: Vec<PopupRow>,
}

/// Round half up, so `-2.5` becomes `-2` and `2.5` becomes `3`.
#[allow(clippy::cast_possible_truncation, reason = "display values are far inside i64 range")]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Treats null and zero alike, as the popup has always done.
fn with_unit(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) if v != 0.0 => format!("{} {unit}", round_half_up(v)),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Barometric altitude in whole meters.
#[must_use]
pub fn format_altitude(altitude: Option<f64>) -> String {
    with_unit(altitude, "m")
}

/// Ground speed in whole m/s.
#[must_use]
pub fn format_velocity(velocity: Option<f64>) -> String {
    with_unit(velocity, "m/s")
}

#[must_use]
pub fn format_vertical_rate(vertical_rate: Option<f64>) -> String {
    with_unit(vertical_rate, "m/s")
}

/// Nearest of the 16 compass points for a heading in degrees.
#[must_use]
pub fn compass_point(heading: f64) -> &'static str {
    let index = round_half_up(heading / 22.5).rem_euclid(16);
    COMPASS_POINTS[usize::try_from(index).unwrap_or(0)]
}

/// Heading as whole degrees plus compass point, e.g. `"92° E"`.
#[must_use]
pub fn format_heading(heading: Option<f64>) -> String {
    match heading {
        Some(h) => format!("{}° {}", round_half_up(h), compass_point(h)),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[must_use]
pub fn format_coordinate(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.4}"))
}

fn or_not_available(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

/// Build the popup shown for `flight`.
#[must_use]
pub fn popup_content(flight: &NormalizedFlight) -> PopupContent {
    fn row(label: &'static str, value: String) -> PopupRow {
        PopupRow { label, value }
    }

    PopupContent {
        title: flight.callsign.clone(),
        rows: vec![
            row("ICAO", flight.icao24.clone()),
            row("Latitude", format_coordinate(Some(flight.latitude))),
            row("Longitude", format_coordinate(Some(flight.longitude))),
            row("Altitude", format_altitude(flight.baro_altitude)),
            row("Speed", format_velocity(flight.velocity)),
            row("Heading", format_heading(flight.heading)),
            row("Vertical Rate", format_vertical_rate(flight.vertical_rate)),
            row("Country", or_not_available(flight.country.as_deref())),
        ],
    }
}

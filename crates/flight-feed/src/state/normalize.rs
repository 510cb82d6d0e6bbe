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

//! Filtering and renaming of raw state vectors into [`NormalizedFlight`]s.

use log::debug;
use serde_json::Value;

use super::{NormalizedFlight, RawStateVector};

/// Callsign used when the provider sends none or only whitespace.
pub const CALLSIGN_PLACEHOLDER: &str = "N/A";

/// Falsy in the provider's loose sense: null or exactly zero.
fn is_falsy(coordinate: Option<f64>) -> bool {
    coordinate.is_none_or(|value| value == 0.0)
}

/// Normalize one state vector, or `None` if it must not be shown.
///
/// Vectors that are on the ground, or lack a longitude or latitude, are
/// dropped. Everything else is copied field for field.
#[must_use]
pub fn normalize_state(state: &RawStateVector) -> Option<NormalizedFlight> {
    if state.on_ground || is_falsy(state.longitude) || is_falsy(state.latitude) {
        return None;
    }

    let callsign = state
        .callsign
        .as_deref()
        .map(str::trim)
        .filter(|callsign| !callsign.is_empty())
        .unwrap_or(CALLSIGN_PLACEHOLDER)
        .to_owned();

    Some(NormalizedFlight {
        icao24: state.icao24.clone(),
        callsign,
        country: state.origin_country.clone(),
        time_position: state.time_position,
        last_contact: state.last_contact,
        longitude: state.longitude?,
        latitude: state.latitude?,
        baro_altitude: state.baro_altitude,
        on_ground: state.on_ground,
        velocity: state.velocity,
        heading: state.true_track,
        vertical_rate: state.vertical_rate,
        sensors: state.sensors.clone(),
        geo_altitude: state.geo_altitude,
        squawk: state.squawk.clone(),
        spi: state.spi,
        position_source: state.position_source,
    })
}

/// Parse and normalize a provider's `states` list, preserving order.
///
/// Entries that cannot be read as a state vector are skipped.
#[must_use]
pub fn normalize_states(states: &[Value]) -> Vec<NormalizedFlight> {
    states
        .iter()
        .filter_map(|value| match RawStateVector::from_value(value) {
            Ok(state) => normalize_state(&state),
            Err(e) => {
                debug!("Skipping unreadable state vector: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn airborne(icao: &str, callsign: Option<&str>, lon: Option<f64>, lat: Option<f64>) -> RawStateVector {
        RawStateVector {
            icao24: icao.to_string(),
            callsign: callsign.map(str::to_string),
            longitude: lon,
            latitude: lat,
            ..Default::default()
        }
    }

    #[test]
    fn test_drops_on_ground() {
        let mut state = airborne("a1", Some("UAL1"), Some(10.0), Some(20.0));
        state.on_ground = true;
        assert!(normalize_state(&state).is_none());
    }

    #[test]
    fn test_drops_missing_or_zero_coordinates() {
        assert!(normalize_state(&airborne("a1", None, None, Some(20.0))).is_none());
        assert!(normalize_state(&airborne("a1", None, Some(10.0), None)).is_none());
        assert!(normalize_state(&airborne("a1", None, Some(0.0), Some(20.0))).is_none());
        assert!(normalize_state(&airborne("a1", None, Some(10.0), Some(0.0))).is_none());
    }

    #[test]
    fn test_keeps_negative_coordinates() {
        let flight = normalize_state(&airborne("a1", Some("QFA1"), Some(-151.2), Some(-33.9))).unwrap();
        assert_eq!(flight.longitude, -151.2);
        assert_eq!(flight.latitude, -33.9);
    }

    #[test]
    fn test_callsign_trimmed() {
        let flight = normalize_state(&airborne("a1", Some("  BAW123 "), Some(1.0), Some(2.0))).unwrap();
        assert_eq!(flight.callsign, "BAW123");
    }

    #[test]
    fn test_blank_callsign_defaults() {
        for callsign in [None, Some(""), Some("    ")] {
            let flight = normalize_state(&airborne("a1", callsign, Some(1.0), Some(2.0))).unwrap();
            assert_eq!(flight.callsign, CALLSIGN_PLACEHOLDER);
        }
    }

    #[test]
    fn test_fields_copied_verbatim() {
        let value = json!([
            "4b1805", "SWR8  ", "Switzerland", 1_700_000_100, 1_700_000_105,
            7.1, 46.9, 11_277.6, false, 240.2, 271.0, 0.33,
            [7], 11_582.4, "7700", true, 2
        ]);
        let state = RawStateVector::from_value(&value).unwrap();
        let flight = normalize_state(&state).unwrap();

        assert_eq!(flight.icao24, "4b1805");
        assert_eq!(flight.callsign, "SWR8");
        assert_eq!(flight.country.as_deref(), Some("Switzerland"));
        assert_eq!(flight.time_position, Some(1_700_000_100));
        assert_eq!(flight.last_contact, Some(1_700_000_105));
        assert_eq!(flight.longitude, 7.1);
        assert_eq!(flight.latitude, 46.9);
        assert_eq!(flight.baro_altitude, Some(11_277.6));
        assert!(!flight.on_ground);
        assert_eq!(flight.velocity, Some(240.2));
        assert_eq!(flight.heading, Some(271.0));
        assert_eq!(flight.vertical_rate, Some(0.33));
        assert_eq!(flight.sensors, Some(vec![7]));
        assert_eq!(flight.geo_altitude, Some(11_582.4));
        assert_eq!(flight.squawk.as_deref(), Some("7700"));
        assert!(flight.spi);
        assert_eq!(flight.position_source, Some(2));
    }

    #[test]
    fn test_normalize_states_filters_and_keeps_order() {
        let states = vec![
            json!(["c", "C1", null, null, null, 3.0, 3.0, null, false]),
            json!(["ground", "G1", null, null, null, 3.0, 3.0, null, true]),
            json!("garbage"),
            json!(["nopos", "N1", null, null, null, null, null, null, false]),
            json!(["a", "A1", null, null, null, 1.0, 1.0, null, false]),
        ];
        let flights = normalize_states(&states);
        let ids: Vec<&str> = flights.iter().map(|f| f.icao24.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }
}

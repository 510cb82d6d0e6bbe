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

//! Typed aircraft state vectors and the gateway wire format.
//!
//! Upstream providers deliver every aircraft as a positional JSON array of 17
//! heterogeneous values. This module turns that array into a [`RawStateVector`]
//! with named fields at the moment it is read, so nothing downstream ever
//! indexes into the provider's schema. It also defines the records served to
//! map clients: [`NormalizedFlight`] and the [`FlightsResponse`] body.

mod normalize;

pub use normalize::{normalize_state, normalize_states, CALLSIGN_PLACEHOLDER};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading a positional state vector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateVectorError {
    #[error("state vector is not an array")]
    NotAnArray,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for field '{field}': {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Origin of an aircraft position, as coded by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    AdsB,
    Asterix,
    Mlat,
    Flarm,
}

impl PositionSource {
    /// Map a raw provider code to a known source.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::AdsB),
            1 => Some(Self::Asterix),
            2 => Some(Self::Mlat),
            3 => Some(Self::Flarm),
            _ => None,
        }
    }
}

/// One aircraft's state vector with the provider's positions given names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawStateVector {
    /// ICAO 24-bit transponder address (hex string).
    pub icao24: String,
    /// Callsign, often padded with trailing spaces.
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    /// Epoch seconds of the last position update.
    pub time_position: Option<i64>,
    /// Epoch seconds of the last message of any kind.
    pub last_contact: Option<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Barometric altitude in meters.
    pub baro_altitude: Option<f64>,
    pub on_ground: bool,
    /// Ground speed in m/s.
    pub velocity: Option<f64>,
    /// Track angle in degrees clockwise from north.
    pub true_track: Option<f64>,
    /// Vertical rate in m/s, positive when climbing.
    pub vertical_rate: Option<f64>,
    pub sensors: Option<Vec<i64>>,
    /// Geometric altitude in meters.
    pub geo_altitude: Option<f64>,
    pub squawk: Option<String>,
    /// Special position indicator.
    pub spi: bool,
    /// Raw position source code, see [`PositionSource`].
    pub position_source: Option<u8>,
}

impl RawStateVector {
    /// Read a state vector from a JSON value that should be a positional array.
    pub fn from_value(value: &Value) -> Result<Self, StateVectorError> {
        match value {
            Value::Array(fields) => Self::from_fields(fields),
            _ => Err(StateVectorError::NotAnArray),
        }
    }

    /// Read a state vector from its positional fields.
    ///
    /// Positions past the end of `fields` are treated as null, so truncated
    /// vectors still parse as long as the identifier is present.
    pub fn from_fields(fields: &[Value]) -> Result<Self, StateVectorError> {
        let fields = Fields(fields);

        let icao24 = fields
            .string(0, "icao24")?
            .ok_or(StateVectorError::MissingField("icao24"))?;

        Ok(Self {
            icao24,
            callsign: fields.string(1, "callsign")?,
            origin_country: fields.string(2, "origin_country")?,
            time_position: fields.integer(3, "time_position")?,
            last_contact: fields.integer(4, "last_contact")?,
            longitude: fields.float(5, "longitude")?,
            latitude: fields.float(6, "latitude")?,
            baro_altitude: fields.float(7, "baro_altitude")?,
            on_ground: fields.flag(8, "on_ground")?,
            velocity: fields.float(9, "velocity")?,
            true_track: fields.float(10, "true_track")?,
            vertical_rate: fields.float(11, "vertical_rate")?,
            sensors: fields.integers(12, "sensors")?,
            geo_altitude: fields.float(13, "geo_altitude")?,
            squawk: fields.string(14, "squawk")?,
            spi: fields.flag(15, "spi")?,
            position_source: fields.code(16, "position_source")?,
        })
    }

    /// Typed view of [`Self::position_source`].
    #[must_use]
    pub fn position_source_kind(&self) -> Option<PositionSource> {
        self.position_source.and_then(PositionSource::from_code)
    }
}

/// Positional accessor that maps JSON values onto field types.
struct Fields<'a>(&'a [Value]);

impl Fields<'_> {
    fn get(&self, index: usize) -> &Value {
        self.0.get(index).unwrap_or(&Value::Null)
    }

    fn string(&self, index: usize, field: &'static str) -> Result<Option<String>, StateVectorError> {
        match self.get(index) {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s.clone())),
            other => Err(invalid(field, other)),
        }
    }

    fn float(&self, index: usize, field: &'static str) -> Result<Option<f64>, StateVectorError> {
        match self.get(index) {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| invalid(field, self.get(index))),
            other => Err(invalid(field, other)),
        }
    }

    fn integer(&self, index: usize, field: &'static str) -> Result<Option<i64>, StateVectorError> {
        match self.get(index) {
            Value::Null => Ok(None),
            value @ Value::Number(_) => as_integer(value)
                .map(Some)
                .ok_or_else(|| invalid(field, value)),
            other => Err(invalid(field, other)),
        }
    }

    fn flag(&self, index: usize, field: &'static str) -> Result<bool, StateVectorError> {
        match self.get(index) {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            other => Err(invalid(field, other)),
        }
    }

    fn integers(&self, index: usize, field: &'static str) -> Result<Option<Vec<i64>>, StateVectorError> {
        match self.get(index) {
            Value::Null => Ok(None),
            Value::Array(items) => items
                .iter()
                .map(|item| as_integer(item).ok_or_else(|| invalid(field, item)))
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            other => Err(invalid(field, other)),
        }
    }

    fn code(&self, index: usize, field: &'static str) -> Result<Option<u8>, StateVectorError> {
        match self.integer(index, field)? {
            None => Ok(None),
            Some(code) => u8::try_from(code)
                .map(Some)
                .map_err(|_| invalid(field, self.get(index))),
        }
    }
}

/// Integer view of a JSON number, accepting floats with no fractional part.
#[allow(clippy::cast_possible_truncation, reason = "value is checked to be integral and in range")]
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

fn invalid(field: &'static str, value: &Value) -> StateVectorError {
    StateVectorError::InvalidValue {
        field,
        value: value.to_string(),
    }
}

/// Upstream provider that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The OpenSky Network public state-vector API.
    OpenSky,
    /// The demo mirror used when OpenSky is unavailable.
    Demo,
}

impl Source {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OpenSky => "opensky",
            Source::Demo => "demo",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An airborne aircraft with a known position, as served to map clients.
///
/// Keys mirror the provider's positional fields one to one. Longitude and
/// latitude are never absent here: vectors without a position are dropped
/// during normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFlight {
    pub icao24: String,
    /// Trimmed callsign, or [`CALLSIGN_PLACEHOLDER`] when blank.
    pub callsign: String,
    pub country: Option<String>,
    pub time_position: Option<i64>,
    pub last_contact: Option<i64>,
    pub longitude: f64,
    pub latitude: f64,
    pub baro_altitude: Option<f64>,
    #[serde(default)]
    pub on_ground: bool,
    pub velocity: Option<f64>,
    pub heading: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub sensors: Option<Vec<i64>>,
    pub geo_altitude: Option<f64>,
    pub squawk: Option<String>,
    #[serde(default)]
    pub spi: bool,
    pub position_source: Option<u8>,
}

/// Successful gateway response for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSnapshot {
    /// Epoch seconds reported by the provider, or the gateway's clock.
    pub time: i64,
    pub flights: Vec<NormalizedFlight>,
    pub source: Source,
    pub count: usize,
}

impl FlightSnapshot {
    #[must_use]
    pub fn new(time: i64, source: Source, flights: Vec<NormalizedFlight>) -> Self {
        let count = flights.len();
        Self {
            time,
            flights,
            source,
            count,
        }
    }
}

/// Gateway response when no provider could be used.
///
/// Always carries an empty flight list so clients can read it like a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightsFailure {
    pub error: String,
    pub flights: Vec<NormalizedFlight>,
    pub count: usize,
}

impl FlightsFailure {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            flights: Vec::new(),
            count: 0,
        }
    }
}

/// Body of `GET /api/flights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlightsResponse {
    Snapshot(FlightSnapshot),
    Failure(FlightsFailure),
}

impl FlightsResponse {
    #[must_use]
    pub fn flights(&self) -> &[NormalizedFlight] {
        match self {
            Self::Snapshot(snapshot) => &snapshot.flights,
            Self::Failure(failure) => &failure.flights,
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Snapshot(snapshot) => snapshot.count,
            Self::Failure(failure) => failure.count,
        }
    }

    /// Provider that answered, if any did.
    #[must_use]
    pub fn source(&self) -> Option<Source> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot.source),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Snapshot(_) => None,
            Self::Failure(failure) => Some(&failure.error),
        }
    }
}

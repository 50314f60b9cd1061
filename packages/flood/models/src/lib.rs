#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood prediction and road network types.
//!
//! These are the validated records that flow between the flood store, the
//! road risk engine and the route scorer. Loosely-typed producer payloads
//! (`GeoJSON` `FeatureCollection`s, registry JSON) are converted into these
//! types at the boundary by the [`features`] module; nothing downstream
//! ever sees raw JSON.
//!
//! All geometry is in WGS84 with `x = longitude`, `y = latitude`.

pub mod features;

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use geo::{LineString, MultiPolygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Producer tag recorded when a feature does not name its source.
pub const DEFAULT_SOURCE: &str = "lisflood";

/// Base weight assumed when a road segment payload omits one.
pub const DEFAULT_BASE_WEIGHT: f64 = 1.0;

/// Validation errors raised at the model boundary.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A `"lat,lon"` string could not be parsed.
    #[error("Invalid coordinate '{input}': {reason}")]
    InvalidCoordinate {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A required field was missing from a feature or record.
    #[error("Missing required field '{field}' in {context}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
        /// Where the field was expected (e.g. "feature 3").
        context: String,
    },

    /// A field was present but out of range or of the wrong type.
    #[error("Invalid value for '{field}' in {context}: {message}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Where the field was found.
        context: String,
        /// Description of the problem.
        message: String,
    },

    /// The payload was not a `GeoJSON` `FeatureCollection`.
    #[error("GeoJSON error: {message}")]
    GeoJson {
        /// Description of the parse failure.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A WGS84 position. Serialized as `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar `geo` coordinate (`x = lon`, `y = lat`).
    #[must_use]
    pub const fn to_coord(self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    /// Builds a coordinate from a planar `geo` coordinate.
    #[must_use]
    pub const fn from_coord(coord: geo::Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lat, lon]: [f64; 2]) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.lat, c.lon]
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

impl FromStr for Coordinate {
    type Err = ModelError;

    /// Parses a `"lat,lon"` string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidCoordinate {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(',').collect();
        if parts.len() != 2 {
            return Err(invalid("expected 'lat,lon'"));
        }

        let lat: f64 = parts[0]
            .trim()
            .parse()
            .map_err(|_| invalid("latitude is not a number"))?;
        let lon: f64 = parts[1]
            .trim()
            .parse()
            .map_err(|_| invalid("longitude is not a number"))?;

        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(invalid("latitude must be within [-90, 90]"));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(invalid("longitude must be within [-180, 180]"));
        }

        Ok(Self { lat, lon })
    }
}

/// A predicted flood extent with its severity.
///
/// Immutable once stored; the store only ever appends or evicts whole
/// predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodPrediction {
    /// Flooded area (lon/lat).
    pub geometry: MultiPolygon<f64>,
    /// Fraction of the area under water, in `[0, 1]`.
    pub submergence_ratio: f64,
    /// Flow speed in m/s, `>= 0`.
    pub velocity: f64,
    /// Time the prediction applies to.
    pub timestamp: DateTime<Utc>,
    /// Producer tag (e.g. `"lisflood"`).
    pub source: String,
}

impl FloodPrediction {
    /// Creates a validated prediction tagged with [`DEFAULT_SOURCE`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidValue`] if the submergence ratio is
    /// outside `[0, 1]` or the velocity is negative or not finite.
    pub fn new(
        geometry: MultiPolygon<f64>,
        submergence_ratio: f64,
        velocity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ModelError> {
        validate_ratio(submergence_ratio, "prediction")?;
        validate_velocity(velocity, "prediction")?;

        Ok(Self {
            geometry,
            submergence_ratio,
            velocity,
            timestamp,
            source: DEFAULT_SOURCE.to_string(),
        })
    }
}

/// Checks that a submergence ratio is a finite value in `[0, 1]`.
///
/// # Errors
///
/// Returns [`ModelError::InvalidValue`] otherwise.
pub fn validate_ratio(ratio: f64, context: &str) -> Result<(), ModelError> {
    if ratio.is_finite() && (0.0..=1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(ModelError::InvalidValue {
            field: "submergence_ratio",
            context: context.to_string(),
            message: format!("{ratio} is not within [0, 1]"),
        })
    }
}

/// Checks that a flow velocity is finite and non-negative.
///
/// # Errors
///
/// Returns [`ModelError::InvalidValue`] otherwise.
pub fn validate_velocity(velocity: f64, context: &str) -> Result<(), ModelError> {
    if velocity.is_finite() && velocity >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidValue {
            field: "velocity",
            context: context.to_string(),
            message: format!("{velocity} must be a non-negative number"),
        })
    }
}

/// A road segment as supplied to the risk engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    /// Stable unique identifier.
    pub road_segment_id: String,
    /// Centreline (lon/lat). `None` means risk is tracked without geometry
    /// and the segment is never intersected.
    pub geometry: Option<LineString<f64>>,
    /// Caller-supplied traversal cost, `> 0`.
    pub base_weight: f64,
}

impl RoadSegment {
    /// Creates a segment.
    #[must_use]
    pub fn new(
        road_segment_id: impl Into<String>,
        geometry: Option<LineString<f64>>,
        base_weight: f64,
    ) -> Self {
        Self {
            road_segment_id: road_segment_id.into(),
            geometry,
            base_weight,
        }
    }
}

/// The persisted flood risk of one road segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadRisk {
    /// Stable unique identifier.
    pub road_segment_id: String,
    /// Centreline as last submitted.
    pub geometry: Option<LineString<f64>>,
    /// Caller-supplied traversal cost.
    pub base_weight: f64,
    /// Flood-adjusted cost, `f64::INFINITY` when closed.
    pub dynamic_weight: f64,
    /// Worst submergence ratio among intersecting flood polygons.
    pub max_submergence: f64,
    /// Whether the segment is impassable.
    pub is_closed: bool,
    /// When the risk was last recomputed.
    pub updated_at: DateTime<Utc>,
}

impl RoadRisk {
    /// The segment view of this record, as fed back into a risk update.
    #[must_use]
    pub fn to_segment(&self) -> RoadSegment {
        RoadSegment {
            road_segment_id: self.road_segment_id.clone(),
            geometry: self.geometry.clone(),
            base_weight: self.base_weight,
        }
    }
}

/// Naive layouts accepted (and interpreted as UTC) when a timestamp has no
/// offset.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a prediction timestamp.
///
/// RFC 3339 strings (including a trailing `Z`) are converted to UTC.
/// Naive date-times and bare dates are taken to be UTC. Anything else is
/// replaced with `now` and logged; a bad timestamp never drops the
/// prediction.
#[must_use]
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let trimmed = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return ts.with_timezone(&Utc);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
        }
    }

    if let Some(naive) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
    }

    log::warn!("Unparseable prediction timestamp '{raw}', treating as now");
    now
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn parses_lat_lon_string() {
        let c: Coordinate = "13.08,80.27".parse().unwrap();
        assert!((c.lat - 13.08).abs() < 1e-9);
        assert!((c.lon - 80.27).abs() < 1e-9);

        let spaced: Coordinate = " 12.95 , 80.22 ".parse().unwrap();
        assert!((spaced.lon - 80.22).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_coordinates() {
        for input in ["invalid", "13.08", "1,2,3", "abc,80", "95,10", "10,181", "NaN,1"] {
            assert!(
                input.parse::<Coordinate>().is_err(),
                "'{input}' should not parse"
            );
        }
    }

    #[test]
    fn coordinate_serializes_as_lat_lon_pair() {
        let json = serde_json::to_string(&Coordinate::new(13.08, 80.27)).unwrap();
        assert_eq!(json, "[13.08,80.27]");
        let back: Coordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Coordinate::new(13.08, 80.27));
    }

    #[test]
    fn timestamp_with_offset_is_normalized_to_utc() {
        let now = Utc::now();
        let ts = parse_timestamp("2025-06-01T12:00:00+05:30", now);
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 6, 1, 6, 30, 0).unwrap());

        let zulu = parse_timestamp("2025-06-01T12:00:00Z", now);
        assert_eq!(zulu, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn naive_timestamp_is_coerced_to_utc() {
        let now = Utc::now();
        let ts = parse_timestamp("2025-06-01T12:00:00", now);
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());

        let date_only = parse_timestamp("2025-06-01", now);
        assert_eq!(date_only, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn garbage_timestamp_becomes_now() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("yesterday-ish", now), now);
        assert_eq!(parse_timestamp("", now), now);
    }

    #[test]
    fn prediction_rejects_out_of_range_values() {
        let now = Utc::now();
        let area = MultiPolygon::new(vec![]);
        assert!(FloodPrediction::new(area.clone(), 1.2, 0.0, now).is_err());
        assert!(FloodPrediction::new(area.clone(), 0.5, -1.0, now).is_err());
        let ok = FloodPrediction::new(area, 0.5, 0.0, now).unwrap();
        assert_eq!(ok.source, DEFAULT_SOURCE);
    }
}

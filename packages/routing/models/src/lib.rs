#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Routing request, decision and risk summary types.
//!
//! [`RouteResponse`] is the JSON contract returned to routing clients; its
//! field names are part of that contract and stay `snake_case`.

use flood_route_flood_models::Coordinate;
use flood_route_risk_models::RiskLevel;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Flood data recency considered when a request does not say.
pub const DEFAULT_PREDICTION_WINDOW_MINUTES: u32 = 30;

/// Outcome of a routing request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RouteStatus {
    /// The route is clear.
    Ok,
    /// The route crosses moderate or high flooding; callers should look
    /// for an alternative.
    Rerouted,
    /// No usable route: the path-finder failed or the route crosses
    /// severe flooding.
    Blocked,
}

/// A routing request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Origin.
    pub start: Coordinate,
    /// Destination.
    pub goal: Coordinate,
    /// Minutes of flood prediction recency to consider.
    #[serde(default = "default_prediction_window")]
    pub prediction_window: u32,
}

const fn default_prediction_window() -> u32 {
    DEFAULT_PREDICTION_WINDOW_MINUTES
}

impl RouteRequest {
    /// Creates a request using the default prediction window.
    #[must_use]
    pub const fn new(start: Coordinate, goal: Coordinate) -> Self {
        Self {
            start,
            goal,
            prediction_window: DEFAULT_PREDICTION_WINDOW_MINUTES,
        }
    }

    /// Overrides the prediction window.
    #[must_use]
    pub const fn with_window(mut self, minutes: u32) -> Self {
        self.prediction_window = minutes;
        self
    }
}

/// Flood exposure of a candidate route, at full precision.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteRisk {
    /// Worst submergence ratio among polygons the route touches.
    pub max_submergence_ratio: f64,
    /// Length of the route inside flood polygons, in metres.
    pub exposure_length_m: f64,
    /// Combined arrival risk in `[0, 1]`.
    pub predicted_arrival_risk: f64,
}

/// The answer to a routing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Decision.
    pub status: RouteStatus,
    /// Echo of the origin.
    pub start: Coordinate,
    /// Echo of the destination.
    pub goal: Coordinate,
    /// Waypoints, empty when the path-finder failed.
    pub route: Vec<Coordinate>,
    /// Tier of `max_submergence_ratio`.
    pub risk_level: RiskLevel,
    /// Rounded to 4 decimal places.
    pub max_submergence_ratio: f64,
    /// Metres, rounded to 2 decimal places.
    pub exposure_length: f64,
    /// Rounded to 4 decimal places.
    pub predicted_arrival_risk: f64,
}

/// Counts from one road risk update cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskUpdateSummary {
    /// Segments whose risk was recomputed and stored.
    pub updated: usize,
    /// Of those, segments now closed.
    pub closed: usize,
    /// Segments considered, including ones skipped for lacking geometry.
    pub total_segments: usize,
    /// Active flood polygons used.
    pub flood_polygon_count: usize,
}

/// Rounds to 4 decimal places.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Rounds to 2 decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RouteStatus::Rerouted).unwrap(), "\"rerouted\"");
        assert_eq!(RouteStatus::Blocked.to_string(), "blocked");
        assert_eq!("ok".parse::<RouteStatus>().unwrap(), RouteStatus::Ok);
    }

    #[test]
    fn response_uses_contract_field_names() {
        let response = RouteResponse {
            status: RouteStatus::Ok,
            start: Coordinate::new(13.08, 80.27),
            goal: Coordinate::new(12.95, 80.22),
            route: vec![Coordinate::new(13.08, 80.27)],
            risk_level: RiskLevel::Low,
            max_submergence_ratio: 0.0,
            exposure_length: 0.0,
            predicted_arrival_risk: 0.0,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["risk_level"], "low");
        assert_eq!(json["start"], serde_json::json!([13.08, 80.27]));
        assert_eq!(json["route"][0], serde_json::json!([13.08, 80.27]));
        assert!(json.get("exposure_length").is_some());
    }

    #[test]
    fn request_defaults_window() {
        let request: RouteRequest =
            serde_json::from_str(r#"{ "start": [13.08, 80.27], "goal": [12.95, 80.22] }"#).unwrap();
        assert_eq!(request.prediction_window, DEFAULT_PREDICTION_WINDOW_MINUTES);
        assert_eq!(request.with_window(90).prediction_window, 90);
    }

    #[test]
    fn rounding() {
        assert!((round4(0.123_456) - 0.1235).abs() < 1e-12);
        assert!((round2(1234.5678) - 1234.57).abs() < 1e-9);
    }
}

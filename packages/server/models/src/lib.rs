#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the flood route server.
//!
//! Types defined here serialize as `camelCase`. Two payloads keep the
//! `snake_case` names of the routing core instead: the routing response
//! (`flood_route_routing_models::RouteResponse`) and the road risk update
//! summary. Road segments inside [`RiskUpdateRequest::segments`] also use
//! the registry's `snake_case` fields (`road_segment_id`, `base_weight`).

use chrono::{DateTime, Utc};
use flood_route_flood_models::RoadRisk;
use flood_route_flood_models::features::{RoadSegmentInput, line_string_to_geojson};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Always `"error"`.
    pub status: String,
    /// What went wrong.
    pub message: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Query parameters for `GET /api/route`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQueryParams {
    /// Origin as `lat,lon`.
    pub start: Option<String>,
    /// Destination as `lat,lon`.
    pub goal: Option<String>,
    /// Prediction window in minutes.
    pub window: Option<u32>,
}

/// Query parameters for `GET /api/predictions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionWindowParams {
    /// Prediction window in minutes.
    pub window: Option<u32>,
}

/// Query parameters for `DELETE /api/predictions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvictParams {
    /// Age cutoff in hours.
    pub older_than_hours: Option<u32>,
}

/// Response to `POST /api/predictions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStoreResult {
    /// Predictions stored.
    pub stored: u64,
    /// Features dropped for unusable geometry.
    pub skipped: usize,
}

/// Response to `DELETE /api/predictions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvictResult {
    /// Predictions removed.
    pub evicted: u64,
}

/// Body of `POST /api/road-risks/update`. Both fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskUpdateRequest {
    /// Segments to evaluate. When absent the stored segments are used.
    #[serde(default)]
    pub segments: Option<Vec<RoadSegmentInput>>,
    /// Prediction window in minutes.
    #[serde(default)]
    pub window: Option<u32>,
}

/// A road risk record as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoadRisk {
    /// Segment identifier.
    pub road_segment_id: String,
    /// `GeoJSON` `LineString`, if known.
    pub geometry: Option<geojson::Geometry>,
    /// Caller-supplied cost.
    pub base_weight: f64,
    /// Flood-adjusted cost; `null` when the segment is closed.
    pub dynamic_weight: Option<f64>,
    /// Worst submergence ratio touching the segment.
    pub max_submergence: f64,
    /// Whether the segment is impassable.
    pub is_closed: bool,
    /// Last recomputation.
    pub updated_at: DateTime<Utc>,
}

impl From<&RoadRisk> for ApiRoadRisk {
    fn from(risk: &RoadRisk) -> Self {
        Self {
            road_segment_id: risk.road_segment_id.clone(),
            geometry: risk.geometry.as_ref().map(line_string_to_geojson),
            base_weight: risk.base_weight,
            dynamic_weight: risk.dynamic_weight.is_finite().then_some(risk.dynamic_weight),
            max_submergence: risk.max_submergence,
            is_closed: risk.is_closed,
            updated_at: risk.updated_at,
        }
    }
}

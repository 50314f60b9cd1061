//! Route risk scoring.

use flood_route_flood_models::{Coordinate, FloodPrediction};
use flood_route_routing_models::RouteRisk;
use flood_route_spatial::{FloodIndex, degrees_to_metres, planar_length};
use geo::LineString;

/// Weight of the worst submergence in the arrival risk.
const SUBMERGENCE_WEIGHT: f64 = 0.6;
/// Weight of the flooded share of the route in the arrival risk.
const EXPOSURE_WEIGHT: f64 = 0.4;

/// Scores a route against flood predictions.
///
/// Routes with fewer than two waypoints, and any route when there are no
/// predictions, score zero.
#[must_use]
pub fn score(route: &[Coordinate], predictions: &[FloodPrediction]) -> RouteRisk {
    if route.len() < 2 || predictions.is_empty() {
        return RouteRisk::default();
    }
    score_with_index(route, &FloodIndex::build(predictions))
}

/// Scores a route against an already built flood index.
#[must_use]
pub fn score_with_index(route: &[Coordinate], index: &FloodIndex) -> RouteRisk {
    if route.len() < 2 || index.is_empty() {
        return RouteRisk::default();
    }

    let line: LineString<f64> = route.iter().map(|c| c.to_coord()).collect();
    let total_deg = planar_length(&line);
    let exposure = index.exposure(&line);

    let exposure_fraction = if total_deg > 0.0 {
        exposure.length_deg / total_deg
    } else {
        0.0
    };

    let predicted_arrival_risk = SUBMERGENCE_WEIGHT
        .mul_add(exposure.max_submergence, EXPOSURE_WEIGHT * exposure_fraction)
        .clamp(0.0, 1.0);

    log::debug!(
        "Route of {} waypoints touches {} flood polygons: max_sub={:.3} exposure={:.5}deg/{:.5}deg",
        route.len(),
        exposure.intersecting,
        exposure.max_submergence,
        exposure.length_deg,
        total_deg
    );

    RouteRisk {
        max_submergence_ratio: exposure.max_submergence,
        exposure_length_m: degrees_to_metres(exposure.length_deg),
        predicted_arrival_risk,
    }
}

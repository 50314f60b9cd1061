//! Routing decision state machine.

use std::sync::Arc;

use flood_route_database::FloodStore;
use flood_route_flood_models::{Coordinate, FloodPrediction};
use flood_route_pathfinder::{PathFinder, PathResult};
use flood_route_risk_models::{RiskLevel, TIER_HIGH, TIER_LOW};
use flood_route_routing_models::{RouteRequest, RouteResponse, RouteStatus, round2, round4};

use crate::{RoutingError, route_risk};

/// Maps the worst submergence along a route and path availability to a
/// status.
#[must_use]
pub fn decide(max_submergence: f64, path_available: bool) -> RouteStatus {
    if !path_available || max_submergence > TIER_HIGH {
        RouteStatus::Blocked
    } else if max_submergence > TIER_LOW {
        RouteStatus::Rerouted
    } else {
        RouteStatus::Ok
    }
}

/// The fixed answer when no path could be obtained.
#[must_use]
pub fn blocked_response(start: Coordinate, goal: Coordinate) -> RouteResponse {
    RouteResponse {
        status: decide(0.0, false),
        start,
        goal,
        route: Vec::new(),
        risk_level: RiskLevel::Severe,
        max_submergence_ratio: 0.0,
        exposure_length: 0.0,
        predicted_arrival_risk: 1.0,
    }
}

/// Builds the response for a request from a flood snapshot and a path
/// result. Pure: the same inputs always give the same response.
#[must_use]
pub fn assemble_response(
    request: &RouteRequest,
    predictions: &[FloodPrediction],
    path: PathResult,
) -> RouteResponse {
    let route = match path {
        PathResult::Found(route) => route,
        PathResult::Unavailable { message } => {
            log::warn!("Path-finder returned no route: {message}");
            return blocked_response(request.start, request.goal);
        }
    };

    let risk = route_risk::score(&route.waypoints, predictions);

    RouteResponse {
        status: decide(risk.max_submergence_ratio, true),
        start: request.start,
        goal: request.goal,
        route: route.waypoints,
        risk_level: RiskLevel::from_ratio(risk.max_submergence_ratio),
        max_submergence_ratio: round4(risk.max_submergence_ratio),
        exposure_length: round2(risk.exposure_length_m),
        predicted_arrival_risk: round4(risk.predicted_arrival_risk),
    }
}

/// Answers routing requests from a flood store and a path-finder.
#[derive(Clone)]
pub struct RoutingOrchestrator {
    floods: Arc<dyn FloodStore>,
    path_finder: Arc<dyn PathFinder>,
}

impl RoutingOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(floods: Arc<dyn FloodStore>, path_finder: Arc<dyn PathFinder>) -> Self {
        Self {
            floods,
            path_finder,
        }
    }

    /// Handles one routing request.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Store`] if the flood store cannot be read.
    /// Path-finder failures are not errors; they yield a blocked response.
    pub async fn route(&self, request: &RouteRequest) -> Result<RouteResponse, RoutingError> {
        log::info!("Route request: {} -> {}", request.start, request.goal);

        let predictions = self.floods.latest(request.prediction_window).await?;
        log::info!("Active flood polygons: {}", predictions.len());

        let path = self.path_finder.get_route(request.start, request.goal).await;
        let response = assemble_response(request, &predictions, path);

        log::info!(
            "Route response: status={} risk_level={} max_sub={:.3}",
            response.status,
            response.risk_level,
            response.max_submergence_ratio
        );

        Ok(response)
    }
}

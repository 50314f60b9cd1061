//! Deterministic offline path generator.

use std::f64::consts::PI;

use flood_route_flood_models::Coordinate;

use crate::{PathFinder, PathResult, Route};

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Assumed average travel speed (36 km/h).
const SPEED_M_PER_S: f64 = 10.0;

/// Number of legs in a generated path (waypoints = legs + 1).
const LEGS: u32 = 10;

/// Peak lateral bow of the path, in degrees.
const BOW_DEG: f64 = 0.002;

/// Returns a straight line between the endpoints with a slight bow.
///
/// Waypoint `i` sits at `t = i / 10` along the line, shifted by
/// `0.002 * sin(pi * t)` north and the same amount west. Distance is the
/// great-circle distance between the endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticPathFinder;

#[async_trait::async_trait]
impl PathFinder for SyntheticPathFinder {
    async fn get_route(&self, start: Coordinate, goal: Coordinate) -> PathResult {
        PathResult::Found(synthetic_route(start, goal))
    }
}

/// Generates the synthetic route between two points.
#[must_use]
pub fn synthetic_route(start: Coordinate, goal: Coordinate) -> Route {
    let waypoints = (0..=LEGS)
        .map(|i| {
            let t = f64::from(i) / f64::from(LEGS);
            let offset = BOW_DEG * (t * PI).sin();
            Coordinate::new(
                round6(t.mul_add(goal.lat - start.lat, start.lat) + offset),
                round6(t.mul_add(goal.lon - start.lon, start.lon) - offset),
            )
        })
        .collect();

    let distance_m = haversine_m(start, goal);

    Route {
        waypoints,
        distance_m,
        duration_s: distance_m / SPEED_M_PER_S,
    }
}

/// Great-circle distance between two points, in metres.
#[must_use]
pub fn haversine_m(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_has_eleven_bowed_waypoints() {
        let start = Coordinate::new(13.08, 80.27);
        let goal = Coordinate::new(12.95, 80.22);
        let route = synthetic_route(start, goal);

        assert_eq!(route.waypoints.len(), 11);
        assert_eq!(route.waypoints[0], start);
        assert_eq!(route.waypoints[10], goal);

        let mid = route.waypoints[5];
        assert!((mid.lat - 13.017).abs() < 1e-9);
        assert!((mid.lon - 80.243).abs() < 1e-9);
    }

    #[test]
    fn duration_follows_distance() {
        let route = synthetic_route(Coordinate::new(13.08, 80.27), Coordinate::new(12.95, 80.22));
        assert!(route.distance_m > 15_000.0 && route.distance_m < 16_000.0);
        assert!((route.duration_s - route.distance_m / 10.0).abs() < 1e-9);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_m(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 1.0);
    }

    #[test]
    fn identical_endpoints_have_zero_distance() {
        let p = Coordinate::new(13.0, 80.0);
        let route = synthetic_route(p, p);
        assert!(route.distance_m.abs() < f64::EPSILON);
        assert_eq!(route.waypoints.len(), 11);
    }
}

//! OSRM HTTP client.
//!
//! Queries `GET {endpoint}/route/v1/driving/{lon},{lat};{lon},{lat}` for a
//! single full-resolution route with `GeoJSON` geometry.

use std::time::Duration;

use flood_route_flood_models::Coordinate;
use serde::Deserialize;

use crate::{PathFinder, PathFinderError, PathResult, Route};

/// Client for an OSRM routing server.
pub struct OsrmClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// `[lon, lat]` pairs.
    coordinates: Vec<[f64; 2]>,
}

impl OsrmClient {
    /// Creates a client for `endpoint` whose requests give up after
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`PathFinderError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PathFinderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The request URL for a route from `start` to `goal`.
    #[must_use]
    pub fn route_url(&self, start: Coordinate, goal: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?geometries=geojson&overview=full&alternatives=false",
            self.endpoint, start.lon, start.lat, goal.lon, goal.lat
        )
    }
}

#[async_trait::async_trait]
impl PathFinder for OsrmClient {
    async fn get_route(&self, start: Coordinate, goal: Coordinate) -> PathResult {
        let url = self.route_url(start, goal);
        log::info!("OSRM request: {url}");

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::error!("OSRM connection failed: {e}");
                return PathResult::unavailable(format!("OSRM unavailable: {e}"));
            }
        };

        // OSRM reports NoRoute and friends as a 4xx with a JSON body, so
        // the body is parsed regardless of status.
        let status = response.status();
        match response.text().await {
            Ok(body) => parse_response(&body),
            Err(e) => {
                log::error!("OSRM response ({status}) could not be read: {e}");
                PathResult::unavailable(format!("OSRM unavailable: {e}"))
            }
        }
    }
}

/// Interprets an OSRM `route` response body.
///
/// Anything other than `code == "Ok"` with at least one route is
/// [`PathResult::Unavailable`]. Coordinates are flipped from `[lon, lat]`.
#[must_use]
pub fn parse_response(body: &str) -> PathResult {
    let response: OsrmResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            log::error!("Malformed OSRM response: {e}");
            return PathResult::unavailable(format!("Malformed OSRM response: {e}"));
        }
    };

    if response.code != "Ok" {
        let message = response
            .message
            .unwrap_or_else(|| format!("OSRM returned {}", response.code));
        log::warn!("OSRM found no route: {message}");
        return PathResult::unavailable(message);
    }

    let Some(route) = response.routes.into_iter().next() else {
        log::warn!("OSRM returned no routes");
        return PathResult::unavailable("No route found");
    };

    PathResult::Found(Route {
        waypoints: route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lon, lat]| Coordinate::new(lat, lon))
            .collect(),
        distance_m: route.distance,
        duration_s: route.duration,
    })
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Path-finder clients.
//!
//! The routing core never computes paths itself. It asks a [`PathFinder`]
//! for one and treats any failure (timeout, refused connection, no route)
//! as [`PathResult::Unavailable`]. Two implementations are provided:
//!
//! - [`osrm::OsrmClient`] queries an OSRM `/route/v1/driving` endpoint;
//! - [`synthetic::SyntheticPathFinder`] returns a deterministic gently
//!   curved path, for tests and offline runs.

pub mod osrm;
pub mod synthetic;

use std::sync::Arc;
use std::time::Duration;

use flood_route_flood_models::Coordinate;
use serde::{Deserialize, Serialize};

/// Default OSRM base URL.
pub const DEFAULT_OSRM_ENDPOINT: &str = "http://localhost:5000";

/// Default bound on a single OSRM request.
pub const DEFAULT_OSRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while constructing a path-finder.
///
/// Failures while *querying* a path are never errors; they become
/// [`PathResult::Unavailable`].
#[derive(Debug, thiserror::Error)]
pub enum PathFinderError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A candidate path between two points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Ordered waypoints, start first.
    pub waypoints: Vec<Coordinate>,
    /// Travel distance in metres.
    pub distance_m: f64,
    /// Travel time in seconds.
    pub duration_s: f64,
}

/// Outcome of a path query.
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// A path was found.
    Found(Route),
    /// No path could be obtained.
    Unavailable {
        /// Human-readable reason, for logs.
        message: String,
    },
}

impl PathResult {
    /// Shorthand for an unavailable result.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// A source of candidate paths.
#[async_trait::async_trait]
pub trait PathFinder: Send + Sync {
    /// Finds a path from `start` to `goal`.
    async fn get_route(&self, start: Coordinate, goal: Coordinate) -> PathResult;
}

/// Which path-finder to construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFinderMode {
    /// Query a live OSRM server.
    Osrm {
        /// Base URL, e.g. `http://localhost:5000`.
        endpoint: String,
        /// Bound on each request.
        timeout: Duration,
    },
    /// Generate paths locally.
    Synthetic,
}

impl Default for PathFinderMode {
    fn default() -> Self {
        Self::Osrm {
            endpoint: DEFAULT_OSRM_ENDPOINT.to_string(),
            timeout: DEFAULT_OSRM_TIMEOUT,
        }
    }
}

/// Builds the path-finder for `mode`.
///
/// # Errors
///
/// Returns [`PathFinderError`] if the HTTP client cannot be constructed.
pub fn create_path_finder(mode: &PathFinderMode) -> Result<Arc<dyn PathFinder>, PathFinderError> {
    match mode {
        PathFinderMode::Osrm { endpoint, timeout } => {
            log::info!("Using OSRM path-finder at {endpoint}");
            Ok(Arc::new(osrm::OsrmClient::new(endpoint, *timeout)?))
        }
        PathFinderMode::Synthetic => {
            log::info!("Using synthetic path-finder");
            Ok(Arc::new(synthetic::SyntheticPathFinder))
        }
    }
}

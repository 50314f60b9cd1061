#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Flood-aware routing core.
//!
//! - [`road_risk`] intersects road segments with active flood polygons and
//!   persists a tiered dynamic weight per segment.
//! - [`route_risk`] scores a candidate route's exposure to flooding.
//! - [`orchestrator`] fetches flood data and a path, scores the path and
//!   decides between `ok`, `rerouted` and `blocked`.
//!
//! Shared state lives only in the stores, which are injected as `Arc`s.

pub mod orchestrator;
pub mod road_risk;
pub mod route_risk;

pub use orchestrator::{RoutingOrchestrator, assemble_response, blocked_response, decide};
pub use road_risk::RoadRiskEngine;
pub use route_risk::score;

use flood_route_database::DbError;

/// Errors from the routing core.
///
/// "No flood data" and "no path" are normal outcomes, not errors. Only a
/// failing store surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A flood or road risk store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

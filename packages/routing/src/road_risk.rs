//! Road risk engine.
//!
//! Each update cycle intersects every road segment that has geometry with
//! the active flood polygons, takes the worst submergence ratio among the
//! polygons it touches, and upserts the resulting weight and closure flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use flood_route_database::{FloodStore, RoadRiskStore};
use flood_route_flood_models::{FloodPrediction, RoadRisk, RoadSegment};
use flood_route_routing_models::RiskUpdateSummary;
use flood_route_spatial::FloodIndex;

use crate::RoutingError;

/// Computes and persists per-segment flood risk.
#[derive(Clone)]
pub struct RoadRiskEngine {
    road_risks: Arc<dyn RoadRiskStore>,
}

impl RoadRiskEngine {
    /// Creates an engine writing to `road_risks`.
    #[must_use]
    pub fn new(road_risks: Arc<dyn RoadRiskStore>) -> Self {
        Self { road_risks }
    }

    /// Fetches predictions from the last `window_minutes` and runs
    /// [`Self::update`] with them.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Store`] if either store fails.
    pub async fn update_from_store(
        &self,
        floods: &dyn FloodStore,
        segments: Option<Vec<RoadSegment>>,
        window_minutes: u32,
    ) -> Result<RiskUpdateSummary, RoutingError> {
        let predictions = floods.latest(window_minutes).await?;
        self.update(segments, &predictions).await
    }

    /// Recomputes the risk of each segment against `predictions`.
    ///
    /// With no predictions nothing is touched and all counts are zero.
    /// When `segments` is `None` the segments already in the road risk
    /// table are re-evaluated. Segments without geometry are counted in
    /// `total_segments` but not updated.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Store`] if the road risk table cannot be read
    /// or written. Segments upserted before the failure stay updated.
    pub async fn update(
        &self,
        segments: Option<Vec<RoadSegment>>,
        predictions: &[FloodPrediction],
    ) -> Result<RiskUpdateSummary, RoutingError> {
        if predictions.is_empty() {
            log::info!("No active flood predictions, all roads at baseline risk");
            return Ok(RiskUpdateSummary::default());
        }

        let index = FloodIndex::build(predictions);

        let segments = match segments {
            Some(segments) => segments,
            None => self
                .road_risks
                .list()
                .await?
                .iter()
                .map(RoadRisk::to_segment)
                .collect(),
        };

        let now = Utc::now();
        let mut summary = RiskUpdateSummary {
            total_segments: segments.len(),
            flood_polygon_count: predictions.len(),
            ..RiskUpdateSummary::default()
        };

        for segment in segments {
            let Some(risk) = assess_segment(segment, &index, now) else {
                continue;
            };

            log::debug!(
                "Segment {}: submergence={:.3} weight={} closed={}",
                risk.road_segment_id,
                risk.max_submergence,
                risk.dynamic_weight,
                risk.is_closed
            );

            self.road_risks.upsert(&risk).await?;

            summary.updated += 1;
            if risk.is_closed {
                summary.closed += 1;
            }
        }

        log::info!(
            "Road risk update complete: {}/{} segments updated, {} closed, {} flood polygons",
            summary.updated,
            summary.total_segments,
            summary.closed,
            summary.flood_polygon_count
        );

        Ok(summary)
    }
}

/// Computes the risk record for one segment, or `None` if it has no
/// geometry to intersect.
#[must_use]
pub fn assess_segment(
    segment: RoadSegment,
    index: &FloodIndex,
    now: DateTime<Utc>,
) -> Option<RoadRisk> {
    let max_submergence = index.max_submergence(segment.geometry.as_ref()?);

    Some(RoadRisk {
        dynamic_weight: flood_route_risk_models::weight(segment.base_weight, max_submergence),
        is_closed: flood_route_risk_models::is_closed(max_submergence),
        max_submergence,
        road_segment_id: segment.road_segment_id,
        geometry: segment.geometry,
        base_weight: segment.base_weight,
        updated_at: now,
    })
}

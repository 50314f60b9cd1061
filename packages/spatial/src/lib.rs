#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index over active flood polygons.
//!
//! Built once per risk-update cycle or routing request from the active
//! predictions. Polygons are pre-filtered on their bounding boxes through an
//! R-tree, then tested exactly with `geo`. All lengths here are planar, in
//! degrees; [`degrees_to_metres`] applies the equatorial approximation.

use flood_route_flood_models::FloodPrediction;
use geo::{BooleanOps, BoundingRect, Intersects, LineString, MultiLineString, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};

/// Metres per degree of arc at the equator.
pub const METRES_PER_DEGREE: f64 = 111_000.0;

/// A flood polygon stored in the R-tree with its severity.
struct FloodEntry {
    submergence_ratio: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for FloodEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// How much of a line runs through flood polygons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exposure {
    /// Worst submergence ratio among polygons touching the line, 0 if none.
    pub max_submergence: f64,
    /// Summed length of the line inside each touching polygon, in degrees.
    /// Overlapping polygons each contribute their own share.
    pub length_deg: f64,
    /// Number of polygons touching the line.
    pub intersecting: usize,
}

/// R-tree of flood polygons.
pub struct FloodIndex {
    floods: RTree<FloodEntry>,
}

impl FloodIndex {
    /// Indexes the geometry of every prediction.
    ///
    /// Predictions with empty geometry cannot intersect anything and are
    /// left out.
    #[must_use]
    pub fn build(predictions: &[FloodPrediction]) -> Self {
        let entries: Vec<FloodEntry> = predictions
            .iter()
            .filter_map(|prediction| {
                let rect = prediction.geometry.bounding_rect()?;
                Some(FloodEntry {
                    submergence_ratio: prediction.submergence_ratio,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    polygon: prediction.geometry.clone(),
                })
            })
            .collect();

        if entries.len() < predictions.len() {
            log::debug!(
                "Left {} predictions with empty geometry out of the flood index",
                predictions.len() - entries.len()
            );
        }

        Self {
            floods: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.floods.size()
    }

    /// Whether no polygons are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.floods.size() == 0
    }

    /// Polygons that geometrically intersect `line`.
    fn intersecting<'a>(
        &'a self,
        line: &'a LineString<f64>,
    ) -> impl Iterator<Item = &'a FloodEntry> + 'a {
        let envelope = line
            .bounding_rect()
            .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]));

        envelope
            .into_iter()
            .flat_map(move |env| self.floods.locate_in_envelope_intersecting(&env))
            .filter(move |entry| entry.polygon.intersects(line))
    }

    /// Worst submergence ratio among polygons intersecting `line`, 0 if
    /// none do.
    #[must_use]
    pub fn max_submergence(&self, line: &LineString<f64>) -> f64 {
        self.intersecting(line)
            .map(|entry| entry.submergence_ratio)
            .fold(0.0, f64::max)
    }

    /// Exposure of `line` to every intersecting polygon.
    #[must_use]
    pub fn exposure(&self, line: &LineString<f64>) -> Exposure {
        let mut exposure = Exposure::default();

        for entry in self.intersecting(line) {
            exposure.intersecting += 1;
            exposure.max_submergence = exposure.max_submergence.max(entry.submergence_ratio);
            exposure.length_deg += clipped_length(&entry.polygon, line);
        }

        exposure
    }
}

/// Planar length of a line in coordinate units.
#[must_use]
pub fn planar_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|segment| segment.dx().hypot(segment.dy())).sum()
}

/// Planar length of the part of `line` inside `polygon`.
#[must_use]
pub fn clipped_length(polygon: &MultiPolygon<f64>, line: &LineString<f64>) -> f64 {
    let clipped = polygon.clip(&MultiLineString::new(vec![line.clone()]), false);
    clipped.0.iter().map(planar_length).sum()
}

/// Converts an angular length to metres.
#[must_use]
pub fn degrees_to_metres(degrees: f64) -> f64 {
    degrees * METRES_PER_DEGREE
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use geo::{line_string, polygon};

    use super::*;

    fn flood(ratio: f64, polygon: geo::Polygon<f64>) -> FloodPrediction {
        FloodPrediction::new(MultiPolygon::new(vec![polygon]), ratio, 0.0, Utc::now()).unwrap()
    }

    fn unit_square(ratio: f64) -> FloodPrediction {
        flood(
            ratio,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
        )
    }

    #[test]
    fn worst_overlapping_polygon_governs() {
        let index = FloodIndex::build(&[
            unit_square(0.3),
            flood(
                0.7,
                polygon![(x: 0.5, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.5, y: 1.0)],
            ),
            flood(
                0.95,
                polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)],
            ),
        ]);
        assert_eq!(index.len(), 3);

        let road = line_string![(x: -1.0, y: 0.5), (x: 3.0, y: 0.5)];
        assert!((index.max_submergence(&road) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn bounding_box_overlap_alone_is_not_an_intersection() {
        let triangle = flood(
            0.9,
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)],
        );
        let index = FloodIndex::build(&[triangle]);

        let road = line_string![(x: 0.9, y: 0.9), (x: 0.95, y: 0.8)];
        assert!(index.max_submergence(&road).abs() < f64::EPSILON);
        assert_eq!(index.exposure(&road), Exposure::default());
    }

    #[test]
    fn exposure_measures_only_the_flooded_part() {
        let index = FloodIndex::build(&[unit_square(0.45)]);

        let crossing = line_string![(x: -1.0, y: 0.5), (x: 2.0, y: 0.5)];
        let exposure = index.exposure(&crossing);
        assert_eq!(exposure.intersecting, 1);
        assert!((exposure.length_deg - 1.0).abs() < 1e-6);
        assert!((exposure.max_submergence - 0.45).abs() < 1e-12);

        let inside = line_string![(x: 0.2, y: 0.2), (x: 0.2, y: 0.5), (x: 0.6, y: 0.5)];
        assert!((index.exposure(&inside).length_deg - 0.7).abs() < 1e-6);
    }

    #[test]
    fn overlapping_polygons_each_count_towards_exposure() {
        let index = FloodIndex::build(&[unit_square(0.3), unit_square(0.5)]);
        let crossing = line_string![(x: -1.0, y: 0.5), (x: 2.0, y: 0.5)];

        let exposure = index.exposure(&crossing);
        assert_eq!(exposure.intersecting, 2);
        assert!((exposure.length_deg - 2.0).abs() < 1e-6);
    }

    #[test]
    fn empty_index_has_no_exposure() {
        let index = FloodIndex::build(&[]);
        assert!(index.is_empty());
        let road = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(index.exposure(&road), Exposure::default());
    }

    #[test]
    fn planar_length_sums_segments() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0), (x: 3.0, y: 6.0)];
        assert!((planar_length(&line) - 7.0).abs() < 1e-12);
        assert!((degrees_to_metres(0.5) - 55_500.0).abs() < 1e-9);
    }
}

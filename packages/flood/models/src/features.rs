//! `GeoJSON` boundary between flood producers and the typed models.
//!
//! Producers deliver `FeatureCollection`s whose features carry a polygon
//! geometry and `{submergence_ratio, velocity?, timestamp?}` properties.
//! Problems are handled by kind:
//!
//! - a missing or out-of-range `submergence_ratio` (or a negative
//!   `velocity`) rejects the whole batch, since the producer sent garbage;
//! - a feature whose geometry is absent or not a usable polygon is skipped
//!   and counted in [`ParsedBatch::skipped`];
//! - an unparseable timestamp becomes "now" (see [`crate::parse_timestamp`]).

use chrono::{DateTime, Utc};
use geo::{LineString, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde::Deserialize;

use crate::{
    DEFAULT_BASE_WEIGHT, DEFAULT_SOURCE, FloodPrediction, ModelError, RoadSegment,
    parse_timestamp, validate_ratio, validate_velocity,
};

/// Predictions parsed from one `FeatureCollection`.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    /// Valid predictions, in feature order.
    pub predictions: Vec<FloodPrediction>,
    /// Features dropped because their geometry was unusable.
    pub skipped: usize,
}

/// Parses a `FeatureCollection` string into flood predictions, using the
/// current time for features without a usable timestamp.
///
/// # Errors
///
/// Returns [`ModelError`] if the payload is not a `FeatureCollection` or
/// any feature has a missing or invalid `submergence_ratio`/`velocity`.
pub fn parse_feature_collection(raw: &str) -> Result<ParsedBatch, ModelError> {
    parse_feature_collection_at(raw, Utc::now())
}

/// Like [`parse_feature_collection`] with an explicit "now".
///
/// # Errors
///
/// See [`parse_feature_collection`].
pub fn parse_feature_collection_at(
    raw: &str,
    now: DateTime<Utc>,
) -> Result<ParsedBatch, ModelError> {
    let geojson: GeoJson = raw.parse().map_err(|e: geojson::Error| ModelError::GeoJson {
        message: e.to_string(),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(ModelError::GeoJson {
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let mut batch = ParsedBatch::default();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let context = format!("feature {index}");
        let properties = feature.properties.unwrap_or_default();

        // Property validation comes first so a malformed batch is rejected
        // even when the offending feature also has bad geometry.
        let submergence_ratio = required_f64(&properties, "submergence_ratio", &context)?;
        validate_ratio(submergence_ratio, &context)?;

        let velocity = optional_f64(&properties, "velocity", &context)?.unwrap_or(0.0);
        validate_velocity(velocity, &context)?;

        let timestamp = match properties.get("timestamp") {
            None | Some(serde_json::Value::Null) => now,
            Some(serde_json::Value::String(s)) => parse_timestamp(s, now),
            Some(other) => {
                log::warn!("Non-string timestamp {other} in {context}, treating as now");
                now
            }
        };

        let source = properties
            .get("source")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(DEFAULT_SOURCE)
            .to_string();

        let Some(geometry) = feature.geometry.as_ref().and_then(|g| multipolygon_from_geojson(&g.value))
        else {
            log::warn!("Skipping {context}: geometry is missing or not a valid polygon");
            batch.skipped += 1;
            continue;
        };

        batch.predictions.push(FloodPrediction {
            geometry,
            submergence_ratio,
            velocity,
            timestamp,
            source,
        });
    }

    Ok(batch)
}

/// Serializes a prediction as a `GeoJSON` feature.
#[must_use]
pub fn to_feature(prediction: &FloodPrediction) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(
        "submergence_ratio".to_string(),
        serde_json::json!(prediction.submergence_ratio),
    );
    properties.insert("velocity".to_string(), serde_json::json!(prediction.velocity));
    properties.insert(
        "timestamp".to_string(),
        serde_json::Value::String(prediction.timestamp.to_rfc3339()),
    );
    properties.insert(
        "source".to_string(),
        serde_json::Value::String(prediction.source.clone()),
    );

    Feature {
        bbox: None,
        geometry: Some(multipolygon_to_geojson(&prediction.geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Serializes predictions as a `GeoJSON` `FeatureCollection`.
#[must_use]
pub fn to_feature_collection(predictions: &[FloodPrediction]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: predictions.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}

/// Converts a `GeoJSON` `Polygon`/`MultiPolygon` into a [`MultiPolygon`].
///
/// Returns `None` for other geometry types, positions with fewer than two
/// ordinates, non-finite ordinates, or rings with fewer than four
/// positions.
#[must_use]
pub fn multipolygon_from_geojson(value: &geojson::Value) -> Option<MultiPolygon<f64>> {
    match value {
        geojson::Value::Polygon(rings) => polygon_from_rings(rings).map(|p| MultiPolygon::new(vec![p])),
        geojson::Value::MultiPolygon(polygons) => {
            let polygons: Option<Vec<Polygon<f64>>> =
                polygons.iter().map(|rings| polygon_from_rings(rings)).collect();
            polygons.filter(|p| !p.is_empty()).map(MultiPolygon::new)
        }
        _ => None,
    }
}

/// Converts a [`MultiPolygon`] into a `GeoJSON` geometry.
#[must_use]
pub fn multipolygon_to_geojson(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// Converts a `GeoJSON` `LineString` into a [`LineString`].
///
/// Returns `None` for other geometry types or lines with fewer than two
/// valid positions.
#[must_use]
pub fn line_string_from_geojson(value: &geojson::Value) -> Option<LineString<f64>> {
    match value {
        geojson::Value::LineString(positions) if positions.len() >= 2 => {
            ring_coords(positions).map(LineString::new)
        }
        _ => None,
    }
}

/// Converts a [`LineString`] into a `GeoJSON` geometry.
#[must_use]
pub fn line_string_to_geojson(line: &LineString<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(line))
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    if exterior.len() < 4 {
        return None;
    }

    let exterior = LineString::new(ring_coords(exterior)?);
    let interiors = interiors
        .iter()
        .filter(|ring| ring.len() >= 4)
        .map(|ring| ring_coords(ring).map(LineString::new))
        .collect::<Option<Vec<_>>>()?;

    Some(Polygon::new(exterior, interiors))
}

fn ring_coords(positions: &[Vec<f64>]) -> Option<Vec<geo::Coord<f64>>> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Some(geo::Coord { x: *x, y: *y }),
            _ => None,
        })
        .collect()
}

fn required_f64(
    properties: &JsonObject,
    field: &'static str,
    context: &str,
) -> Result<f64, ModelError> {
    optional_f64(properties, field, context)?.ok_or_else(|| ModelError::MissingField {
        field,
        context: context.to_string(),
    })
}

fn optional_f64(
    properties: &JsonObject,
    field: &'static str,
    context: &str,
) -> Result<Option<f64>, ModelError> {
    match properties.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| ModelError::InvalidValue {
            field,
            context: context.to_string(),
            message: format!("expected a number, got {value}"),
        }),
    }
}

/// A road segment as delivered by a registry payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RoadSegmentInput {
    /// Stable unique identifier.
    pub road_segment_id: String,
    /// Optional `GeoJSON` `LineString` centreline.
    #[serde(default)]
    pub geometry: Option<geojson::Geometry>,
    /// Traversal cost, defaults to [`DEFAULT_BASE_WEIGHT`].
    #[serde(default = "default_base_weight")]
    pub base_weight: f64,
}

const fn default_base_weight() -> f64 {
    DEFAULT_BASE_WEIGHT
}

impl TryFrom<RoadSegmentInput> for RoadSegment {
    type Error = ModelError;

    fn try_from(input: RoadSegmentInput) -> Result<Self, Self::Error> {
        let context = format!("road segment '{}'", input.road_segment_id);

        if input.road_segment_id.trim().is_empty() {
            return Err(ModelError::MissingField {
                field: "road_segment_id",
                context,
            });
        }

        if !input.base_weight.is_finite() || input.base_weight <= 0.0 {
            return Err(ModelError::InvalidValue {
                field: "base_weight",
                context,
                message: format!("{} must be a positive number", input.base_weight),
            });
        }

        let geometry = match input.geometry {
            None => None,
            Some(g) => Some(line_string_from_geojson(&g.value).ok_or_else(|| {
                ModelError::InvalidValue {
                    field: "geometry",
                    context: context.clone(),
                    message: "expected a LineString with at least two positions".to_string(),
                }
            })?),
        };

        Ok(Self {
            road_segment_id: input.road_segment_id,
            geometry,
            base_weight: input.base_weight,
        })
    }
}

/// Parses a JSON array of registry road segments.
///
/// # Errors
///
/// Returns [`ModelError`] if the JSON is malformed or any segment fails
/// validation.
pub fn parse_road_segments(raw: &str) -> Result<Vec<RoadSegment>, ModelError> {
    let inputs: Vec<RoadSegmentInput> = serde_json::from_str(raw)?;
    inputs.into_iter().map(RoadSegment::try_from).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn square_feature(ratio: f64, extra: &str) -> String {
        format!(
            r#"{{
                "type": "Feature",
                "geometry": {{
                    "type": "Polygon",
                    "coordinates": [[[80.0, 12.8], [80.5, 12.8], [80.5, 13.2], [80.0, 13.2], [80.0, 12.8]]]
                }},
                "properties": {{ "submergence_ratio": {ratio}{extra} }}
            }}"#
        )
    }

    fn collection(features: &[String]) -> String {
        format!(
            r#"{{ "type": "FeatureCollection", "features": [{}] }}"#,
            features.join(",")
        )
    }

    #[test]
    fn parses_valid_features() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let raw = collection(&[
            square_feature(0.45, r#", "velocity": 1.0, "timestamp": "2099-12-31T00:00:00+00:00""#),
            square_feature(0.1, ""),
        ]);

        let batch = parse_feature_collection_at(&raw, now).unwrap();
        assert_eq!(batch.predictions.len(), 2);
        assert_eq!(batch.skipped, 0);

        let first = &batch.predictions[0];
        assert!((first.submergence_ratio - 0.45).abs() < 1e-12);
        assert!((first.velocity - 1.0).abs() < 1e-12);
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0).unwrap()
        );
        assert_eq!(first.geometry.0.len(), 1);

        let second = &batch.predictions[1];
        assert!(second.velocity.abs() < f64::EPSILON);
        assert_eq!(second.timestamp, now);
        assert_eq!(second.source, DEFAULT_SOURCE);
    }

    #[test]
    fn skips_unusable_geometry() {
        let line = r#"{
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[80.0, 12.8], [80.5, 13.0]] },
            "properties": { "submergence_ratio": 0.5 }
        }"#;
        let degenerate = r#"{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[80.0, 12.8], [80.5, 12.8]]] },
            "properties": { "submergence_ratio": 0.5 }
        }"#;
        let missing = r#"{ "type": "Feature", "geometry": null, "properties": { "submergence_ratio": 0.5 } }"#;

        let raw = collection(&[
            square_feature(0.3, ""),
            line.to_string(),
            degenerate.to_string(),
            missing.to_string(),
        ]);
        let batch = parse_feature_collection(&raw).unwrap();
        assert_eq!(batch.predictions.len(), 1);
        assert_eq!(batch.skipped, 3);
    }

    #[test]
    fn rejects_missing_or_invalid_ratio() {
        let missing = collection(&[r#"{
            "type": "Feature",
            "geometry": { "type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]] },
            "properties": { "velocity": 1.0 }
        }"#
        .to_string()]);
        assert!(matches!(
            parse_feature_collection(&missing),
            Err(ModelError::MissingField { field: "submergence_ratio", .. })
        ));

        let out_of_range = collection(&[square_feature(1.5, "")]);
        assert!(parse_feature_collection(&out_of_range).is_err());

        let negative_velocity = collection(&[square_feature(0.5, r#", "velocity": -2.0"#)]);
        assert!(parse_feature_collection(&negative_velocity).is_err());
    }

    #[test]
    fn rejects_non_collection_payloads() {
        assert!(parse_feature_collection(&square_feature(0.5, "")).is_err());
        assert!(parse_feature_collection("not json").is_err());
    }

    #[test]
    fn bad_timestamp_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let raw = collection(&[
            square_feature(0.5, r#", "timestamp": "last tuesday""#),
            square_feature(0.5, r#", "timestamp": 12345"#),
        ]);
        let batch = parse_feature_collection_at(&raw, now).unwrap();
        assert_eq!(batch.predictions.len(), 2);
        assert!(batch.predictions.iter().all(|p| p.timestamp == now));
    }

    #[test]
    fn feature_collection_output_reparses() {
        let raw = collection(&[square_feature(0.6, r#", "velocity": 0.5"#)]);
        let batch = parse_feature_collection(&raw).unwrap();

        let out = to_feature_collection(&batch.predictions).to_string();
        let again = parse_feature_collection(&out).unwrap();
        assert_eq!(again.predictions, batch.predictions);
    }

    #[test]
    fn parses_road_segments() {
        let raw = r#"[
            { "road_segment_id": "seg-1",
              "geometry": { "type": "LineString", "coordinates": [[80.1, 12.9], [80.2, 13.0]] },
              "base_weight": 2.5 },
            { "road_segment_id": "seg-2" }
        ]"#;
        let segments = parse_road_segments(raw).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].geometry.as_ref().unwrap().0.len(), 2);
        assert!((segments[0].base_weight - 2.5).abs() < f64::EPSILON);
        assert!(segments[1].geometry.is_none());
        assert!((segments[1].base_weight - DEFAULT_BASE_WEIGHT).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_road_segments() {
        assert!(parse_road_segments(r#"[{ "road_segment_id": "a", "base_weight": 0 }]"#).is_err());
        assert!(
            parse_road_segments(
                r#"[{ "road_segment_id": "a",
                      "geometry": { "type": "Point", "coordinates": [80.0, 13.0] } }]"#
            )
            .is_err()
        );
    }
}

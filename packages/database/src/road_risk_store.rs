//! Per-segment road risk table.
//!
//! Keyed by `road_segment_id`; an upsert replaces the whole record.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use flood_route_flood_models::RoadRisk;
use flood_route_flood_models::features::{line_string_from_geojson, line_string_to_geojson};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::{DbError, format_timestamp};

/// Storage contract for road risk records.
#[async_trait]
pub trait RoadRiskStore: Send + Sync {
    /// Inserts or replaces the record for `risk.road_segment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails.
    async fn upsert(&self, risk: &RoadRisk) -> Result<(), DbError>;

    /// Looks up one segment.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    async fn get(&self, road_segment_id: &str) -> Result<Option<RoadRisk>, DbError>;

    /// Every stored record, ordered by segment id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    async fn list(&self) -> Result<Vec<RoadRisk>, DbError>;
}

/// Process-local road risk table.
#[derive(Debug, Default)]
pub struct MemoryRoadRiskStore {
    risks: RwLock<BTreeMap<String, RoadRisk>>,
}

impl MemoryRoadRiskStore {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoadRiskStore for MemoryRoadRiskStore {
    async fn upsert(&self, risk: &RoadRisk) -> Result<(), DbError> {
        self.risks
            .write()
            .map_err(|_| DbError::LockPoisoned)?
            .insert(risk.road_segment_id.clone(), risk.clone());
        Ok(())
    }

    async fn get(&self, road_segment_id: &str) -> Result<Option<RoadRisk>, DbError> {
        Ok(self
            .risks
            .read()
            .map_err(|_| DbError::LockPoisoned)?
            .get(road_segment_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<RoadRisk>, DbError> {
        Ok(self
            .risks
            .read()
            .map_err(|_| DbError::LockPoisoned)?
            .values()
            .cloned()
            .collect())
    }
}

/// Durable road risk table backed by `road_risks`.
///
/// A closed segment's infinite weight is stored as `NULL`.
pub struct SqliteRoadRiskStore {
    db: Arc<dyn Database>,
}

impl SqliteRoadRiskStore {
    /// Wraps an open database and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if schema creation fails.
    pub async fn new(db: Arc<dyn Database>) -> Result<Self, DbError> {
        db.exec_raw(
            "CREATE TABLE IF NOT EXISTS road_risks (
                road_segment_id TEXT PRIMARY KEY,
                geometry        TEXT,
                base_weight     REAL NOT NULL,
                dynamic_weight  REAL,
                max_submergence REAL NOT NULL,
                is_closed       INTEGER NOT NULL,
                updated_at      TEXT NOT NULL
            )",
        )
        .await?;

        Ok(Self { db })
    }
}

fn risk_from_row(row: &Row) -> Result<RoadRisk, DbError> {
    let road_segment_id: String =
        row.to_value("road_segment_id")
            .map_err(|e| DbError::Conversion {
                message: format!("Failed to read road_segment_id: {e}"),
            })?;

    let geometry_json: Option<String> = row.to_value("geometry").unwrap_or(None);
    let geometry = geometry_json.and_then(|raw| {
        let line = serde_json::from_str::<geojson::Geometry>(&raw)
            .ok()
            .and_then(|g| line_string_from_geojson(&g.value));
        if line.is_none() {
            log::warn!("Unreadable geometry stored for road segment {road_segment_id}");
        }
        line
    });

    let dynamic_weight: Option<f64> = row.to_value("dynamic_weight").unwrap_or(None);
    let is_closed: i64 = row.to_value("is_closed").unwrap_or(0);
    let updated_at: String = row.to_value("updated_at").unwrap_or_default();

    Ok(RoadRisk {
        road_segment_id,
        geometry,
        base_weight: row.to_value("base_weight").unwrap_or(1.0),
        dynamic_weight: dynamic_weight.unwrap_or(f64::INFINITY),
        max_submergence: row.to_value("max_submergence").unwrap_or(0.0),
        is_closed: is_closed != 0,
        updated_at: flood_route_flood_models::parse_timestamp(&updated_at, Utc::now()),
    })
}

#[async_trait]
impl RoadRiskStore for SqliteRoadRiskStore {
    async fn upsert(&self, risk: &RoadRisk) -> Result<(), DbError> {
        let geometry = match &risk.geometry {
            Some(line) => DatabaseValue::String(serde_json::to_string(&line_string_to_geojson(line))?),
            None => DatabaseValue::Null,
        };
        let dynamic_weight = if risk.dynamic_weight.is_finite() {
            DatabaseValue::Real64(risk.dynamic_weight)
        } else {
            DatabaseValue::Null
        };

        self.db
            .exec_raw_params(
                "INSERT INTO road_risks (
                    road_segment_id, geometry, base_weight, dynamic_weight,
                    max_submergence, is_closed, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (road_segment_id) DO UPDATE SET
                    geometry = excluded.geometry,
                    base_weight = excluded.base_weight,
                    dynamic_weight = excluded.dynamic_weight,
                    max_submergence = excluded.max_submergence,
                    is_closed = excluded.is_closed,
                    updated_at = excluded.updated_at",
                &[
                    DatabaseValue::String(risk.road_segment_id.clone()),
                    geometry,
                    DatabaseValue::Real64(risk.base_weight),
                    dynamic_weight,
                    DatabaseValue::Real64(risk.max_submergence),
                    DatabaseValue::Int64(i64::from(risk.is_closed)),
                    DatabaseValue::String(format_timestamp(risk.updated_at)),
                ],
            )
            .await?;

        Ok(())
    }

    async fn get(&self, road_segment_id: &str) -> Result<Option<RoadRisk>, DbError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT * FROM road_risks WHERE road_segment_id = $1",
                &[DatabaseValue::String(road_segment_id.to_string())],
            )
            .await?;

        rows.first().map(risk_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<RoadRisk>, DbError> {
        let rows = self
            .db
            .query_raw_params("SELECT * FROM road_risks ORDER BY road_segment_id", &[])
            .await?;

        rows.iter().map(risk_from_row).collect()
    }
}

//! Time-windowed store of flood predictions.
//!
//! Predictions are append-only: [`FloodStore::store`] adds a whole batch
//! at once, [`FloodStore::latest`] reads the ones inside a recency window
//! and [`FloodStore::evict`] drops the ones older than a horizon. Nothing
//! is ever deduplicated or updated in place.

use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use flood_route_flood_models::features::{multipolygon_from_geojson, multipolygon_to_geojson};
use flood_route_flood_models::{FloodPrediction, parse_timestamp};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::{DbError, eviction_cutoff, format_timestamp, window_cutoff};

/// Rows per `INSERT` statement when writing a batch to `SQLite`.
const INSERT_CHUNK_ROWS: usize = 1_000;

/// Columns bound per inserted prediction.
const COLUMNS_PER_ROW: usize = 5;

/// Storage contract for flood predictions.
#[async_trait]
pub trait FloodStore: Send + Sync {
    /// Appends all predictions as one unit; concurrent readers see either
    /// none or all of them. An empty batch is a no-op returning 0.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails. Nothing is stored in that
    /// case.
    async fn store(&self, predictions: &[FloodPrediction]) -> Result<u64, DbError>;

    /// Returns every prediction with `timestamp >= now - window_minutes`,
    /// in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    async fn latest(&self, window_minutes: u32) -> Result<Vec<FloodPrediction>, DbError>;

    /// Removes predictions older than `now - older_than_hours` and returns
    /// how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the delete fails.
    async fn evict(&self, older_than_hours: u32) -> Result<u64, DbError>;

    /// Total number of stored predictions.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the read fails.
    async fn count(&self) -> Result<u64, DbError>;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local flood store.
///
/// A single `RwLock` guards the list, so a batch appended under one write
/// guard is observed atomically by readers.
#[derive(Debug, Default)]
pub struct MemoryFloodStore {
    predictions: RwLock<Vec<FloodPrediction>>,
}

impl MemoryFloodStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FloodStore for MemoryFloodStore {
    async fn store(&self, predictions: &[FloodPrediction]) -> Result<u64, DbError> {
        if predictions.is_empty() {
            log::warn!("store called with an empty batch");
            return Ok(0);
        }

        self.predictions
            .write()
            .map_err(|_| DbError::LockPoisoned)?
            .extend_from_slice(predictions);

        log::info!("Memory store: stored {} flood predictions", predictions.len());
        Ok(predictions.len() as u64)
    }

    async fn latest(&self, window_minutes: u32) -> Result<Vec<FloodPrediction>, DbError> {
        let cutoff = window_cutoff(Utc::now(), window_minutes);

        let active: Vec<FloodPrediction> = self
            .predictions
            .read()
            .map_err(|_| DbError::LockPoisoned)?
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .cloned()
            .collect();

        log::debug!(
            "Retrieved {} active flood predictions (last {window_minutes} min)",
            active.len()
        );
        Ok(active)
    }

    async fn evict(&self, older_than_hours: u32) -> Result<u64, DbError> {
        let cutoff = eviction_cutoff(Utc::now(), older_than_hours);

        let mut predictions = self.predictions.write().map_err(|_| DbError::LockPoisoned)?;
        let before = predictions.len();
        predictions.retain(|p| p.timestamp >= cutoff);
        let evicted = (before - predictions.len()) as u64;
        drop(predictions);

        log::info!("Evicted {evicted} predictions older than {older_than_hours}h");
        Ok(evicted)
    }

    async fn count(&self) -> Result<u64, DbError> {
        Ok(self
            .predictions
            .read()
            .map_err(|_| DbError::LockPoisoned)?
            .len() as u64)
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Durable flood store backed by a `flood_predictions` table.
pub struct SqliteFloodStore {
    db: Arc<dyn Database>,
}

impl SqliteFloodStore {
    /// Wraps an open database and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if schema creation fails.
    pub async fn new(db: Arc<dyn Database>) -> Result<Self, DbError> {
        ensure_schema(db.as_ref()).await?;
        Ok(Self { db })
    }
}

async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS flood_predictions (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            geometry          TEXT NOT NULL,
            submergence_ratio REAL NOT NULL,
            velocity          REAL NOT NULL,
            timestamp         TEXT NOT NULL,
            source            TEXT NOT NULL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_flood_predictions_timestamp
         ON flood_predictions (timestamp)",
    )
    .await?;

    Ok(())
}

/// Inserts one chunk of predictions as a single multi-row statement.
async fn insert_chunk(db: &dyn Database, chunk: &[FloodPrediction]) -> Result<u64, DbError> {
    let mut sql = String::from(
        "INSERT INTO flood_predictions \
         (geometry, submergence_ratio, velocity, timestamp, source) VALUES ",
    );
    let mut params = Vec::with_capacity(chunk.len() * COLUMNS_PER_ROW);

    for (i, prediction) in chunk.iter().enumerate() {
        let base = i * COLUMNS_PER_ROW;
        if i > 0 {
            sql.push_str(", ");
        }
        write!(
            sql,
            "(${}, ${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5
        )
        .map_err(|e| DbError::Conversion {
            message: e.to_string(),
        })?;

        params.push(DatabaseValue::String(serde_json::to_string(
            &multipolygon_to_geojson(&prediction.geometry),
        )?));
        params.push(DatabaseValue::Real64(prediction.submergence_ratio));
        params.push(DatabaseValue::Real64(prediction.velocity));
        params.push(DatabaseValue::String(format_timestamp(prediction.timestamp)));
        params.push(DatabaseValue::String(prediction.source.clone()));
    }

    Ok(db.exec_raw_params(&sql, &params).await?)
}

#[async_trait]
impl FloodStore for SqliteFloodStore {
    async fn store(&self, predictions: &[FloodPrediction]) -> Result<u64, DbError> {
        if predictions.is_empty() {
            log::warn!("store called with an empty batch");
            return Ok(0);
        }

        // All chunks go through one transaction so readers see the whole
        // batch or none of it.
        let txn = self.db.begin_transaction().await?;

        let mut inserted = 0;
        for chunk in predictions.chunks(INSERT_CHUNK_ROWS) {
            match insert_chunk(txn.as_ref(), chunk).await {
                Ok(n) => inserted += n,
                Err(e) => {
                    if let Err(rollback) = txn.rollback().await {
                        log::error!("Failed to roll back prediction batch: {rollback}");
                    }
                    return Err(e);
                }
            }
        }

        txn.commit().await?;

        log::info!("SQLite store: stored {inserted} flood predictions");
        Ok(inserted)
    }

    async fn latest(&self, window_minutes: u32) -> Result<Vec<FloodPrediction>, DbError> {
        let now = Utc::now();
        let cutoff = window_cutoff(now, window_minutes);

        let rows = self
            .db
            .query_raw_params(
                "SELECT geometry, submergence_ratio, velocity, timestamp, source
                 FROM flood_predictions
                 WHERE timestamp >= $1",
                &[DatabaseValue::String(format_timestamp(cutoff))],
            )
            .await?;

        let mut predictions = Vec::with_capacity(rows.len());
        for row in &rows {
            let geometry_json: String = row.to_value("geometry").map_err(|e| DbError::Conversion {
                message: format!("Failed to read prediction geometry: {e}"),
            })?;

            let geometry = serde_json::from_str::<geojson::Geometry>(&geometry_json)
                .ok()
                .and_then(|g| multipolygon_from_geojson(&g.value));
            let Some(geometry) = geometry else {
                log::warn!("Skipping stored prediction with unreadable geometry");
                continue;
            };

            let timestamp: String = row.to_value("timestamp").unwrap_or_default();

            predictions.push(FloodPrediction {
                geometry,
                submergence_ratio: row.to_value("submergence_ratio").unwrap_or(0.0),
                velocity: row.to_value("velocity").unwrap_or(0.0),
                timestamp: parse_timestamp(&timestamp, now),
                source: row.to_value("source").unwrap_or_default(),
            });
        }

        log::debug!(
            "Retrieved {} active flood predictions (last {window_minutes} min)",
            predictions.len()
        );
        Ok(predictions)
    }

    async fn evict(&self, older_than_hours: u32) -> Result<u64, DbError> {
        let cutoff = eviction_cutoff(Utc::now(), older_than_hours);

        let evicted = self
            .db
            .exec_raw_params(
                "DELETE FROM flood_predictions WHERE timestamp < $1",
                &[DatabaseValue::String(format_timestamp(cutoff))],
            )
            .await?;

        log::info!("Evicted {evicted} predictions older than {older_than_hours}h");
        Ok(evicted)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let rows = self
            .db
            .query_raw_params("SELECT COUNT(*) as cnt FROM flood_predictions", &[])
            .await?;

        let count: i64 = rows.first().map_or(0, |r| r.to_value("cnt").unwrap_or(0));

        #[allow(clippy::cast_sign_loss)]
        Ok(count as u64)
    }
}

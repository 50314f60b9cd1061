#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Storage for flood predictions and per-segment road risk.
//!
//! Both stores sit behind a trait ([`FloodStore`], [`RoadRiskStore`]) with
//! an in-memory implementation and a `SQLite` one built on
//! `switchy_database`. The backend is picked once in [`db::open`]; callers
//! hold `Arc<dyn ...>` handles and never branch on it.

pub mod db;
pub mod flood_store;
pub mod road_risk_store;

pub use flood_store::{FloodStore, MemoryFloodStore, SqliteFloodStore};
pub use road_risk_store::{MemoryRoadRiskStore, RoadRiskStore, SqliteRoadRiskStore};

use chrono::{DateTime, SecondsFormat, Utc};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The database could not be opened.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// I/O error (creating the database directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of a stored geometry failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// An in-memory store lock was poisoned by a panicking writer.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Formats a timestamp the way both `SQLite` tables store it.
///
/// Fixed precision and a `Z` suffix make lexical order equal time order,
/// so range filters can compare the text directly.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Start of the window that ends now and spans `minutes`.
///
/// Windows reaching past the earliest representable time start there.
#[must_use]
pub fn window_cutoff(now: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    now.checked_sub_signed(chrono::Duration::minutes(i64::from(minutes)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Eviction cutoff `hours` before now, or the earliest representable time
/// when that is further back.
#[must_use]
pub fn eviction_cutoff(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now.checked_sub_signed(chrono::Duration::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

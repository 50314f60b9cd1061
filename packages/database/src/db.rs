//! Backend selection and `SQLite` connection setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::{
    DbError, FloodStore, MemoryFloodStore, MemoryRoadRiskStore, RoadRiskStore, SqliteFloodStore,
    SqliteRoadRiskStore,
};

/// Which storage engine backs the stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local, lost on restart.
    Memory,
    /// Durable `SQLite` file.
    Sqlite {
        /// Database file, created with its parent directory if missing.
        path: PathBuf,
    },
}

/// The pair of shared stores handed to the routing core.
#[derive(Clone)]
pub struct Stores {
    /// Flood predictions.
    pub floods: Arc<dyn FloodStore>,
    /// Road segment risk table.
    pub road_risks: Arc<dyn RoadRiskStore>,
}

/// Opens both stores on the given backend.
///
/// # Errors
///
/// Returns [`DbError`] if the `SQLite` database cannot be opened or its
/// schema cannot be created.
pub async fn open(backend: &StoreBackend) -> Result<Stores, DbError> {
    match backend {
        StoreBackend::Memory => {
            log::info!("Using in-memory flood and road risk stores");
            Ok(Stores {
                floods: Arc::new(MemoryFloodStore::new()),
                road_risks: Arc::new(MemoryRoadRiskStore::new()),
            })
        }
        StoreBackend::Sqlite { path } => {
            log::info!("Opening SQLite store at {}", path.display());
            let db: Arc<dyn Database> = Arc::from(open_sqlite(path)?);

            let floods = SqliteFloodStore::new(db.clone()).await?;
            let road_risks = SqliteRoadRiskStore::new(db).await?;

            Ok(Stores {
                floods: Arc::new(floods),
                road_risks: Arc::new(road_risks),
            })
        }
    }
}

/// Opens (or creates) a `SQLite` database file.
///
/// # Errors
///
/// Returns [`DbError`] if the parent directory cannot be created or the
/// file cannot be opened.
pub fn open_sqlite(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection {
        message: e.to_string(),
    })
}

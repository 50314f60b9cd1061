#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for flood-aware routing.
//!
//! Serves the routing query, flood prediction ingestion and road risk
//! endpoints over one shared pair of stores. A background task evicts
//! stale flood predictions on a fixed interval.

mod handlers;

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use flood_route_config::{DbMode, FloodRouteConfig, OsrmConfig, RoutingConfig, StoreConfig};
use flood_route_database::db::{self, StoreBackend, Stores};
use flood_route_database::{DbError, FloodStore, RoadRiskStore};
use flood_route_pathfinder::{PathFinder, PathFinderError, PathFinderMode, create_path_finder};
use flood_route_routing::{RoadRiskEngine, RoutingOrchestrator};

/// Largest accepted request body (flood `FeatureCollection`s can be big).
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Errors that prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The stores could not be opened.
    #[error("Store error: {0}")]
    Db(#[from] DbError),
    /// The path-finder could not be constructed.
    #[error("Path-finder error: {0}")]
    PathFinder(#[from] PathFinderError),
    /// The HTTP listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state.
pub struct AppState {
    /// Flood prediction store.
    pub floods: Arc<dyn FloodStore>,
    /// Road risk table.
    pub road_risks: Arc<dyn RoadRiskStore>,
    /// Routing request handler.
    pub orchestrator: RoutingOrchestrator,
    /// Road risk update engine.
    pub engine: RoadRiskEngine,
    /// Window used when a request does not give one.
    pub prediction_window_minutes: u32,
    /// Eviction cutoff used when a request does not give one.
    pub eviction_horizon_hours: u32,
}

impl AppState {
    /// Wires the routing core over already opened stores.
    #[must_use]
    pub fn new(stores: Stores, path_finder: Arc<dyn PathFinder>, routing: &RoutingConfig) -> Self {
        Self {
            orchestrator: RoutingOrchestrator::new(stores.floods.clone(), path_finder),
            engine: RoadRiskEngine::new(stores.road_risks.clone()),
            floods: stores.floods,
            road_risks: stores.road_risks,
            prediction_window_minutes: routing.prediction_window_minutes,
            eviction_horizon_hours: routing.eviction_horizon_hours,
        }
    }

    /// Opens the configured stores and path-finder.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the store cannot be opened or the HTTP
    /// client cannot be built.
    pub async fn from_config(config: &FloodRouteConfig) -> Result<Self, ServerError> {
        let stores = db::open(&store_backend(&config.store)).await?;
        let path_finder = create_path_finder(&path_finder_mode(&config.osrm))?;
        Ok(Self::new(stores, path_finder, &config.routing))
    }
}

/// Maps store settings to a backend.
#[must_use]
pub fn store_backend(config: &StoreConfig) -> StoreBackend {
    match config.mode {
        DbMode::Memory => StoreBackend::Memory,
        DbMode::Sqlite => StoreBackend::Sqlite {
            path: config.path.clone(),
        },
    }
}

/// Maps OSRM settings to a path-finder mode.
#[must_use]
pub fn path_finder_mode(config: &OsrmConfig) -> PathFinderMode {
    if config.mock {
        PathFinderMode::Synthetic
    } else {
        PathFinderMode::Osrm {
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .route("/health", web::get().to(handlers::health))
            .route("/route", web::get().to(handlers::route))
            .route("/predictions", web::post().to(handlers::store_predictions))
            .route("/predictions", web::get().to(handlers::list_predictions))
            .route("/predictions", web::delete().to(handlers::evict_predictions))
            .route("/road-risks/update", web::post().to(handlers::update_road_risks))
            .route("/road-risks", web::get().to(handlers::list_road_risks)),
    );
}

/// Evicts predictions older than `horizon_hours` every `every`.
///
/// Must be called from within an actix system.
pub fn spawn_eviction_task(floods: Arc<dyn FloodStore>, horizon_hours: u32, every: Duration) {
    actix_rt::spawn(async move {
        let mut ticker = actix_rt::time::interval(every);
        loop {
            ticker.tick().await;
            match floods.evict(horizon_hours).await {
                Ok(0) => log::debug!("Eviction: nothing older than {horizon_hours}h"),
                Ok(evicted) => log::info!("Eviction: removed {evicted} stale predictions"),
                Err(e) => log::error!("Eviction failed: {e}"),
            }
        }
    });
}

/// Starts the flood route API server.
///
/// Opens the stores, starts periodic eviction and serves until the
/// listener stops. The caller provides the actix runtime (e.g. via
/// `#[actix_web::main]`) and initialises logging.
///
/// # Errors
///
/// Returns [`ServerError`] if the stores or path-finder cannot be set up,
/// or the HTTP server fails to bind.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: FloodRouteConfig) -> Result<(), ServerError> {
    log::info!("Opening {} store...", config.store.mode);
    let state = AppState::from_config(&config).await?;

    if config.routing.eviction_interval_minutes > 0 {
        spawn_eviction_task(
            state.floods.clone(),
            config.routing.eviction_horizon_hours,
            Duration::from_secs(u64::from(config.routing.eviction_interval_minutes) * 60),
        );
    }

    let state = web::Data::new(state);
    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the flood route toolchain.
//!
//! Every subcommand reads the same configuration as the server
//! (`FLOOD_ROUTE_CONFIG` plus environment overrides), so with a `SQLite`
//! store the CLI and a running server share data.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use flood_route_config::FloodRouteConfig;
use flood_route_database::db::{self, Stores};
use flood_route_flood_models::Coordinate;
use flood_route_flood_models::features::{parse_feature_collection, parse_road_segments};
use flood_route_pathfinder::create_path_finder;
use flood_route_routing::{RoadRiskEngine, RoutingOrchestrator};
use flood_route_routing_models::RouteRequest;
use flood_route_server::{path_finder_mode, store_backend};

#[derive(Parser)]
#[command(name = "flood_route", about = "Flood-aware routing toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config and `PORT`)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Compute a flood-aware route and print it as JSON
    Route {
        /// Origin as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        start: Coordinate,
        /// Destination as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        goal: Coordinate,
        /// Prediction window in minutes
        #[arg(long)]
        window: Option<u32>,
    },
    /// Store a `GeoJSON` `FeatureCollection` of flood predictions
    Ingest {
        /// Path to the `FeatureCollection` file
        file: PathBuf,
    },
    /// Remove flood predictions older than the eviction horizon
    Evict {
        /// Age cutoff in hours
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Recompute road segment risk from active flood predictions
    UpdateRisks {
        /// JSON array of road segments. Without it the stored segments
        /// are re-evaluated.
        #[arg(long)]
        segments: Option<PathBuf>,
        /// Prediction window in minutes
        #[arg(long)]
        window: Option<u32>,
    },
    /// List stored road risks
    Risks,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let mut config = FloodRouteConfig::load()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(flood_route_server::run_server(config))
            })
            .await??;
        }
        Commands::Route {
            start,
            goal,
            window,
        } => {
            let stores = open_stores(&config).await?;
            let path_finder = create_path_finder(&path_finder_mode(&config.osrm))?;
            let orchestrator = RoutingOrchestrator::new(stores.floods, path_finder);

            let request = RouteRequest::new(start, goal)
                .with_window(window.unwrap_or(config.routing.prediction_window_minutes));
            let response = orchestrator.route(&request).await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Ingest { file } => {
            let stores = open_stores(&config).await?;
            let raw = read_file(&file)?;
            let batch = parse_feature_collection(&raw)?;

            let stored = stores.floods.store(&batch.predictions).await?;
            log::info!("Stored {stored} predictions from {}", file.display());
            if batch.skipped > 0 {
                log::warn!("Skipped {} features with unusable geometry", batch.skipped);
            }
            println!("stored: {stored}, skipped: {}", batch.skipped);
        }
        Commands::Evict { hours } => {
            let stores = open_stores(&config).await?;
            let hours = hours.unwrap_or(config.routing.eviction_horizon_hours);

            let evicted = stores.floods.evict(hours).await?;
            println!("evicted: {evicted} (older than {hours}h)");
        }
        Commands::UpdateRisks { segments, window } => {
            let stores = open_stores(&config).await?;
            let segments = match segments {
                Some(path) => Some(parse_road_segments(&read_file(&path)?)?),
                None => None,
            };

            let engine = RoadRiskEngine::new(stores.road_risks);
            let summary = engine
                .update_from_store(
                    stores.floods.as_ref(),
                    segments,
                    window.unwrap_or(config.routing.prediction_window_minutes),
                )
                .await?;

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Risks => {
            let stores = open_stores(&config).await?;
            let risks = stores.road_risks.list().await?;

            println!(
                "{:<24} {:>8} {:>10} {:>10} CLOSED",
                "SEGMENT", "BASE", "WEIGHT", "SUBMERGED"
            );
            println!("{}", "-".repeat(64));
            for risk in &risks {
                println!(
                    "{:<24} {:>8.2} {:>10.2} {:>10.3} {}",
                    risk.road_segment_id,
                    risk.base_weight,
                    risk.dynamic_weight,
                    risk.max_submergence,
                    if risk.is_closed { "yes" } else { "no" }
                );
            }
            println!("\n{} segment(s)", risks.len());
        }
    }

    Ok(())
}

async fn open_stores(config: &FloodRouteConfig) -> Result<Stores, flood_route_database::DbError> {
    log::info!("Opening {} store...", config.store.mode);
    db::open(&store_backend(&config.store)).await
}

fn read_file(path: &Path) -> Result<String, std::io::Error> {
    std::fs::read_to_string(path).map_err(|e| {
        log::error!("Failed to read {}: {e}", path.display());
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_route_arguments() {
        let cli = Cli::try_parse_from([
            "flood_route",
            "route",
            "--start",
            "13.08,80.27",
            "--goal",
            "-12.95,-80.22",
            "--window",
            "60",
        ])
        .unwrap();

        let Commands::Route {
            start,
            goal,
            window,
        } = cli.command
        else {
            panic!("expected route");
        };
        assert_eq!(start, Coordinate::new(13.08, 80.27));
        assert_eq!(goal, Coordinate::new(-12.95, -80.22));
        assert_eq!(window, Some(60));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(
            Cli::try_parse_from(["flood_route", "route", "--start", "13.08", "--goal", "1,2"])
                .is_err()
        );
    }

    #[test]
    fn update_risks_arguments_are_optional() {
        let cli = Cli::try_parse_from(["flood_route", "update-risks"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::UpdateRisks {
                segments: None,
                window: None
            }
        ));
    }
}

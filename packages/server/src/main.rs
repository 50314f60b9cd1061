#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Flood route API server binary.
//!
//! Configuration comes from `FLOOD_ROUTE_CONFIG` and the environment; see
//! `flood_route_config`.

use flood_route_config::FloodRouteConfig;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = FloodRouteConfig::load()?;
    flood_route_server::run_server(config).await?;

    Ok(())
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Runtime configuration.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. built-in defaults;
//! 2. a TOML file named by `FLOOD_ROUTE_CONFIG`, if set;
//! 3. individual environment variables (`PORT`, `OSRM_ENDPOINT`, ...).
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [store]
//! mode = "sqlite"
//! path = "data/flood_route.db"
//!
//! [osrm]
//! endpoint = "http://osrm.internal:5000"
//! mock = false
//! timeout_secs = 10
//!
//! [routing]
//! prediction_window_minutes = 30
//! eviction_horizon_hours = 24
//! eviction_interval_minutes = 15
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_VAR: &str = "FLOOD_ROUTE_CONFIG";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`FloodRouteConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {var}: {message}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Rejected value.
        value: String,
        /// What was expected.
        message: String,
    },
}

/// Which flood/road risk store backend to use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DbMode {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// Durable `SQLite` file.
    Sqlite,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind_addr: String,
    /// TCP port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend.
    pub mode: DbMode,
    /// `SQLite` database file, used when `mode = "sqlite"`.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            mode: DbMode::Memory,
            path: PathBuf::from("data/flood_route.db"),
        }
    }
}

/// Path-finder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    /// OSRM base URL.
    pub endpoint: String,
    /// Use the synthetic path-finder instead of OSRM.
    pub mock: bool,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            mock: false,
            timeout_secs: 10,
        }
    }
}

/// Flood data retention and recency settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Default recency window for routing and risk updates.
    pub prediction_window_minutes: u32,
    /// Predictions older than this are evicted.
    pub eviction_horizon_hours: u32,
    /// How often the server runs eviction. 0 disables it.
    pub eviction_interval_minutes: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            prediction_window_minutes: 30,
            eviction_horizon_hours: 24,
            eviction_interval_minutes: 15,
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FloodRouteConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Store backend.
    pub store: StoreConfig,
    /// Path-finder.
    pub osrm: OsrmConfig,
    /// Retention and recency.
    pub routing: RoutingConfig,
}

impl FloodRouteConfig {
    /// Loads defaults, then the file named by `FLOOD_ROUTE_CONFIG`, then
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// environment variable has an unparseable value.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Reads a TOML config file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&raw)
    }

    /// Parses TOML config text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not valid.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Unset and empty variables are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for a value that does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = get("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(mode) = get("FLOOD_ROUTE_DB_MODE") {
            self.store.mode = parse_env("FLOOD_ROUTE_DB_MODE", &mode)?;
        }
        if let Some(path) = get("FLOOD_ROUTE_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(endpoint) = get("OSRM_ENDPOINT") {
            self.osrm.endpoint = endpoint;
        }
        if let Some(mock) = get("OSRM_MOCK") {
            self.osrm.mock = matches!(mock.trim(), "1" | "true" | "yes");
        }
        if let Some(timeout) = get("OSRM_TIMEOUT_SECS") {
            self.osrm.timeout_secs = parse_env("OSRM_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(window) = get("PREDICTION_WINDOW_MINUTES") {
            self.routing.prediction_window_minutes =
                parse_env("PREDICTION_WINDOW_MINUTES", &window)?;
        }
        if let Some(horizon) = get("EVICTION_HORIZON_HOURS") {
            self.routing.eviction_horizon_hours = parse_env("EVICTION_HORIZON_HOURS", &horizon)?;
        }

        Ok(())
    }
}

fn parse_env<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let config = FloodRouteConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.mode, DbMode::Memory);
        assert_eq!(config.osrm.endpoint, "http://localhost:5000");
        assert_eq!(config.osrm.timeout_secs, 10);
        assert_eq!(config.routing.prediction_window_minutes, 30);
        assert_eq!(config.routing.eviction_horizon_hours, 24);
        assert_eq!(config.routing.eviction_interval_minutes, 15);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FloodRouteConfig::from_toml_str(
            r#"
            [store]
            mode = "sqlite"

            [routing]
            prediction_window_minutes = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.store.mode, DbMode::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("data/flood_route.db"));
        assert_eq!(config.routing.prediction_window_minutes, 60);
        assert_eq!(config.routing.eviction_horizon_hours, 24);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn rejects_bad_toml() {
        assert!(FloodRouteConfig::from_toml_str("[store]\nmode = \"postgres\"").is_err());
        assert!(FloodRouteConfig::from_toml_str("not toml =").is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = FloodRouteConfig::from_toml_str("[server]\nport = 9000").unwrap();
        config
            .apply_env(env(&[
                ("PORT", "9100"),
                ("FLOOD_ROUTE_DB_MODE", "SQLite"),
                ("FLOOD_ROUTE_DB_PATH", "/tmp/floods.db"),
                ("OSRM_MOCK", "1"),
                ("OSRM_ENDPOINT", "http://osrm:5000"),
                ("EVICTION_HORIZON_HOURS", "48"),
                ("BIND_ADDR", ""),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.bind_addr, "127.0.0.1");
        assert_eq!(config.store.mode, DbMode::Sqlite);
        assert_eq!(config.store.path, PathBuf::from("/tmp/floods.db"));
        assert!(config.osrm.mock);
        assert_eq!(config.osrm.endpoint, "http://osrm:5000");
        assert_eq!(config.routing.eviction_horizon_hours, 48);
    }

    #[test]
    fn rejects_unparseable_environment() {
        let mut config = FloodRouteConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PORT", .. }));

        let err = config
            .apply_env(env(&[("FLOOD_ROUTE_DB_MODE", "postgres")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "FLOOD_ROUTE_DB_MODE", .. }));
    }
}

//! Startup configuration: a typed, strictly-validated document layered over built-in defaults.
//!
//! Grounded on the original `Config.py`'s "defaults, then overlay from file if present" loading
//! order and its default values (world border of ±10,000,000, heuristic threshold 2000, pull
//! cost 10); expressed here as a `serde`-validated struct rather than a loosely-typed dict, in
//! keeping with how the rest of this crate treats external documents (see `map::MapDocument`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::WorldBorder;

/// Storage backend selection and its opaque backend-specific configuration blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub storage_provider_type: String,
    #[serde(default)]
    pub storage_provider_config: serde_json::Value,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            storage_provider_type: "json_file".to_string(),
            storage_provider_config: serde_json::json!({ "path": "map.json" }),
        }
    }
}

/// The address/port the network-facing request collaborator binds to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NetworkInterface {
    pub address: String,
    pub port: u16,
}

impl Default for NetworkInterface {
    fn default() -> Self {
        NetworkInterface { address: "127.0.0.1".to_string(), port: 8080 }
    }
}

/// Logger backend selection. The core only ever calls through `log`'s facade (see `error`'s
/// module docs and `DESIGN.md`'s Logger entry); `logger_type`/`logger_config` are accepted for
/// schema compatibility with the original configuration surface but currently only the `stdout`
/// backend (`env_logger` writing to stderr) is wired up in `main`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    #[serde(default = "default_logger_type")]
    pub logger_type: String,
    #[serde(default)]
    pub logger_config: serde_json::Value,
}

fn default_logger_type() -> String {
    "stdout".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig { logger_type: default_logger_type(), logger_config: serde_json::Value::Null }
    }
}

/// The full recognised configuration surface. Unknown top-level keys are rejected, mirroring
/// `map::MapDocument`'s strictness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    #[serde(flatten)]
    pub storage: StorageConfig,
    pub world_border_dimensions: WorldBorder,
    pub network_interface: NetworkInterface,
    #[serde(flatten)]
    pub logger: LoggerConfig,
    pub heuristic_distance_threshold: i64,
    pub heuristic_pull_cost: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig::default(),
            world_border_dimensions: WorldBorder::default(),
            network_interface: NetworkInterface::default(),
            logger: LoggerConfig::default(),
            heuristic_distance_threshold: 2000,
            heuristic_pull_cost: 10,
        }
    }
}

/// Loads configuration: start from [`Config::default`], then overlay whatever `path` contains if
/// the file exists. A missing file is not an error — it yields the defaults outright, matching
/// the original loader's "run with sane defaults out of the box" behavior.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("transit-planner-config-test-does-not-exist.json");
        let config = load_config(&path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn file_overlays_defaults() {
        let dir = std::env::temp_dir().join(format!("transit-planner-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"storage_provider_type":"json_file","world_border_dimensions":{"min_x":0,"max_x":100,"min_y":0,"max_y":100},"network_interface":{"address":"0.0.0.0","port":9090},"logger_type":"stdout","heuristic_distance_threshold":500,"heuristic_pull_cost":3}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.network_interface.port, 9090);
        assert_eq!(config.world_border_dimensions.max_x, 100);
        assert_eq!(config.heuristic_distance_threshold, 500);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = std::env::temp_dir().join(format!("transit-planner-config-test-reject-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"bogus_key":true}"#).unwrap();

        let result = load_config(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}

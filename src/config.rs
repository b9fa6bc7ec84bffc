//! Configuration loading and data folder resolution
//!
//! Storage handles are injected explicitly into every repository; this module
//! only answers "where does the database file live" for embedding binaries.

use crate::{Error, Result};
use std::path::PathBuf;

/// Environment variable naming the data folder
pub const DATA_DIR_ENV: &str = "PRESSROOM_DATA";

/// Database file name inside the data folder
const DATABASE_FILE: &str = "pressroom.db";

/// Resolve the data folder in priority order:
/// 1. Command-line argument (highest priority)
/// 2. `PRESSROOM_DATA` environment variable
/// 3. `data_dir` key in the TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&str>) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_path) = config_file_path() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_dir) = config.get("data_dir").and_then(|v| v.as_str()) {
                    return PathBuf::from(data_dir);
                }
            }
        }
    }

    default_data_dir()
}

/// Full path of the database file inside the resolved data folder
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

fn config_file_path() -> Result<PathBuf> {
    let path = dirs::config_dir()
        .map(|d| d.join("pressroom").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if path.exists() {
        Ok(path)
    } else {
        Err(Error::Config(format!("Config file not found: {:?}", path)))
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pressroom"))
        .unwrap_or_else(|| PathBuf::from("./pressroom_data"))
}

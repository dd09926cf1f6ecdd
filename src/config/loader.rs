// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{GridConfig, RawGridConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawGridConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawGridConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawGridConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Parse and validate configuration held in memory.
pub fn parse_config(contents: &str) -> Result<GridConfig> {
    let raw: RawGridConfig = toml::from_str(contents)?;
    GridConfig::try_from(raw)
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks for:
///   - an empty topology,
///   - empty or duplicate node IDs.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<GridConfig> {
    let raw_config = load_from_path(&path)?;
    let config = GridConfig::try_from(raw_config)?;
    Ok(config)
}

/// Helper to resolve a default config path.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Grid.toml")
}

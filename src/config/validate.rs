// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{GridConfig, RawGridConfig};
use crate::errors::{GridError, Result};

impl TryFrom<RawGridConfig> for GridConfig {
    type Error = GridError;

    fn try_from(raw: RawGridConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(GridConfig::new_unchecked(raw.engine, raw.node))
    }
}

fn validate_raw_config(cfg: &RawGridConfig) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_node_ids(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawGridConfig) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(GridError::ConfigError(
            "config must contain at least one [[node]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_ids(cfg: &RawGridConfig) -> Result<()> {
    let mut seen = HashSet::new();

    for node in cfg.node.iter() {
        if node.id.trim().is_empty() {
            return Err(GridError::ConfigError(
                "[[node]] entry has an empty `id`".to_string(),
            ));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(GridError::ConfigError(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
    }
    Ok(())
}

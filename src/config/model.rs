// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::session::DEFAULT_FAILOVER_ATTEMPTS;
use crate::topology::{Node, TopologySnapshot};
use crate::types::NodeRole;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// failover_attempts = 2
///
/// [[node]]
/// id = "n1"
/// role = "server"
/// attributes = { dc = "eu-1" }
///
/// [[node]]
/// id = "n2"
/// role = "client"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawGridConfig {
    /// Engine behaviour from `[engine]`.
    #[serde(default)]
    pub engine: EngineSection,

    /// Topology from the `[[node]]` entries, in file order.
    #[serde(default)]
    pub node: Vec<NodeConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawGridConfig>`, so holding one means the
/// topology is non-empty and node IDs are unique.
#[derive(Debug, Clone)]
pub struct GridConfig {
    pub engine: EngineSection,
    pub node: Vec<NodeConfig>,
}

impl GridConfig {
    pub(crate) fn new_unchecked(engine: EngineSection, node: Vec<NodeConfig>) -> Self {
        Self { engine, node }
    }

    /// Topology snapshot listing the configured nodes in file order.
    pub fn topology(&self) -> TopologySnapshot {
        self.node.iter().map(NodeConfig::to_node).collect()
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineSection {
    /// Maximum re-dispatches of a single job when a task asks for failover.
    #[serde(default = "default_failover_attempts")]
    pub failover_attempts: usize,
}

fn default_failover_attempts() -> usize {
    DEFAULT_FAILOVER_ATTEMPTS
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            failover_attempts: default_failover_attempts(),
        }
    }
}

/// One `[[node]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,

    /// `"server"` (default) or `"client"`.
    #[serde(default)]
    pub role: NodeRole,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl NodeConfig {
    pub fn to_node(&self) -> Node {
        self.attributes
            .iter()
            .fold(Node::new(self.id.as_str(), self.role), |node, (k, v)| {
                node.with_attribute(k.as_str(), v.as_str())
            })
    }
}

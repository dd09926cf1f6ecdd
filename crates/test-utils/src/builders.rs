#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use gridtask::config::{EngineSection, GridConfig, NodeConfig, RawGridConfig};
use gridtask::topology::{Node, TopologySnapshot};
use gridtask::types::NodeRole;

/// Builder for `TopologySnapshot` to simplify test setup.
#[derive(Default)]
pub struct TopologyBuilder {
    nodes: Vec<Node>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server(mut self, id: &str) -> Self {
        self.nodes.push(Node::server(id));
        self
    }

    pub fn client(mut self, id: &str) -> Self {
        self.nodes.push(Node::client(id));
        self
    }

    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// `count` servers named `n1`, `n2`, ...
    pub fn servers(mut self, count: usize) -> Self {
        for i in 1..=count {
            self.nodes.push(Node::server(format!("n{i}")));
        }
        self
    }

    pub fn build(self) -> TopologySnapshot {
        TopologySnapshot::new(self.nodes)
    }

    pub fn build_arc(self) -> Arc<TopologySnapshot> {
        Arc::new(self.build())
    }
}

/// Builder for a validated `GridConfig`.
pub struct GridConfigBuilder {
    config: RawGridConfig,
}

impl GridConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawGridConfig {
                engine: EngineSection::default(),
                node: Vec::new(),
            },
        }
    }

    pub fn failover_attempts(mut self, attempts: usize) -> Self {
        self.config.engine.failover_attempts = attempts;
        self
    }

    pub fn node(mut self, id: &str, role: NodeRole) -> Self {
        self.config.node.push(NodeConfig {
            id: id.to_string(),
            role,
            attributes: BTreeMap::new(),
        });
        self
    }

    pub fn build(self) -> GridConfig {
        GridConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for GridConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

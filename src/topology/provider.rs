// src/topology/provider.rs

use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::config::GridConfig;
use crate::topology::TopologySnapshot;

/// Source of topology snapshots.
///
/// Discovery and membership live behind this trait; the engine only asks for
/// the current snapshot when a task is submitted.
pub trait TopologyProvider: Send + Sync {
    fn snapshot(&self) -> Arc<TopologySnapshot>;
}

/// Provider serving a fixed snapshot that can be swapped wholesale.
///
/// Replacing the snapshot never affects sessions that already mapped against
/// the previous one.
#[derive(Debug, Default)]
pub struct StaticTopology {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl StaticTopology {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Build the topology described by the `[[node]]` entries of a config.
    pub fn from_config(cfg: &GridConfig) -> Self {
        Self::new(cfg.topology())
    }

    /// Install a new snapshot (e.g. after a node joined or left).
    pub fn replace(&self, snapshot: TopologySnapshot) {
        info!(nodes = snapshot.len(), "topology snapshot replaced");
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }
}

impl TopologyProvider for StaticTopology {
    fn snapshot(&self) -> Arc<TopologySnapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }
}

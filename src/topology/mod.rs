// src/topology/mod.rs

//! Cluster topology as seen by the engine.
//!
//! - [`snapshot`] holds node handles and the ordered, read-only snapshot
//!   handed to `Task::map`.
//! - [`provider`] defines where snapshots come from. Membership itself is
//!   not managed here; the engine only consumes whatever snapshot it gets.

pub mod provider;
pub mod snapshot;

pub use provider::{StaticTopology, TopologyProvider};
pub use snapshot::{Node, NodeId, TopologySnapshot};

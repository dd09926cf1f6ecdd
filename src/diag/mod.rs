// src/diag/mod.rs

//! Diagnostic tasks built on the engine.
//!
//! - [`node_info`]: single-target task reporting a node's identity.
//! - [`tx`]: cluster-wide listing of active transactions, filtered by
//!   duration, size and label, over a server/client/explicit projection.

pub mod node_info;
pub mod tx;

pub use node_info::{NodeInfo, NodeInfoArg, NodeInfoJob, NodeInfoTask};
pub use tx::{TxInfo, TxLog, TxProjection, TxSortOrder, TxTask, TxTaskArg, TxTaskResult};

// src/diag/node_info.rs

use std::collections::BTreeMap;

use crate::task::{Job, JobContext, JobFailure, SingleNodeTask, TargetNode};
use crate::topology::NodeId;
use crate::types::NodeRole;

/// Argument naming the node to describe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfoArg {
    node: NodeId,
}

impl NodeInfoArg {
    pub fn new(node: impl Into<NodeId>) -> Self {
        Self { node: node.into() }
    }
}

impl TargetNode for NodeInfoArg {
    fn target_node_id(&self) -> &NodeId {
        &self.node
    }
}

/// Identity of a node as reported by the node itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub role: NodeRole,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeInfoJob;

impl Job for NodeInfoJob {
    type Output = NodeInfo;

    fn execute(&self, ctx: &JobContext) -> Result<NodeInfo, JobFailure> {
        let node = ctx.node();
        Ok(NodeInfo {
            id: node.id().clone(),
            role: node.role(),
            attributes: node.attributes().clone(),
        })
    }
}

/// Single-target task describing one node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeInfoTask;

impl SingleNodeTask for NodeInfoTask {
    type Arg = NodeInfoArg;
    type Job = NodeInfoJob;

    fn job(&self, _arg: &NodeInfoArg) -> NodeInfoJob {
        NodeInfoJob
    }
}

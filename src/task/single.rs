// src/task/single.rs

//! Single-target task template.
//!
//! Most diagnostic and management tasks run exactly one job on exactly one
//! node named by their argument. A [`SingleNodeTask`] supplies only the job
//! factory; wrapping it in [`SingleNode`] yields a complete [`Task`] with:
//! - `map`: linear scan of the snapshot for the target ID, failing with
//!   `NodeNotFound` when it is gone (no internal retry);
//! - `on_result`: always `Wait`;
//! - `reduce`: unwrap the one payload, or hand back the job's failure
//!   unchanged.

use anyhow::anyhow;
use tracing::debug;

use crate::errors::{GridError, MappingError, Result};
use crate::policy::PolicyDecision;
use crate::task::{Job, JobAssignment, JobResult, ResultSet, Task};
use crate::topology::{Node, NodeId, TopologySnapshot};

/// Argument surface of single-target tasks.
pub trait TargetNode {
    /// ID of the node the job must run on, compared verbatim.
    fn target_node_id(&self) -> &NodeId;
}

/// A task that runs one job on the node named by its argument.
pub trait SingleNodeTask: Send + Sync + 'static {
    type Arg: TargetNode;
    type Job: Job;

    /// Create the job for `arg`.
    fn job(&self, arg: &Self::Arg) -> Self::Job;
}

/// Adapter turning a [`SingleNodeTask`] into a [`Task`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleNode<S>(pub S);

impl<S> SingleNode<S> {
    pub fn new(inner: S) -> Self {
        SingleNode(inner)
    }

    pub fn inner(&self) -> &S {
        &self.0
    }
}

impl<S: SingleNodeTask> Task for SingleNode<S> {
    type Arg = S::Arg;
    type Job = S::Job;
    type Reduced = <S::Job as Job>::Output;

    fn map(
        &self,
        topology: &TopologySnapshot,
        arg: &Self::Arg,
    ) -> Result<JobAssignment<Self::Job>> {
        let node = find_target(topology, arg.target_node_id())?;
        debug!(node = %node.id(), "single-target task mapped");
        Ok(JobAssignment::single(self.0.job(arg), node))
    }

    fn on_result(
        &self,
        _result: &JobResult<Self::Reduced>,
        _received: &ResultSet<Self::Reduced>,
    ) -> PolicyDecision {
        PolicyDecision::Wait
    }

    fn reduce(&self, results: ResultSet<Self::Reduced>) -> Result<Self::Reduced> {
        reduce_single(results)
    }
}

/// Find the node with ID `id`, or fail with `NodeNotFound` describing the
/// snapshot that was searched.
pub fn find_target<'a>(topology: &'a TopologySnapshot, id: &NodeId) -> Result<&'a Node> {
    topology.find(id).ok_or_else(|| {
        GridError::Mapping(MappingError::NodeNotFound {
            id: id.clone(),
            topology: topology.clone(),
        })
    })
}

/// Unwrap the single result of a one-job task.
///
/// A carried failure is returned as [`GridError::JobFailed`] holding the same
/// [`JobFailure`](crate::task::JobFailure) value, never a rewrapped copy.
pub fn reduce_single<T>(results: ResultSet<T>) -> Result<T> {
    let count = results.len();
    let result = results.into_single().ok_or_else(|| {
        GridError::Reduce(anyhow!(
            "single-node task expects exactly one job result, got {count}"
        ))
    })?;

    result.into_outcome().map_err(GridError::JobFailed)
}

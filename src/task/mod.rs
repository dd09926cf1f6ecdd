// src/task/mod.rs

//! Task and job contracts.
//!
//! A [`Task`] is user-defined map/reduce logic:
//! - `map` turns an argument and a topology snapshot into a [`JobAssignment`];
//! - `on_result` is consulted after every job result and returns a
//!   [`PolicyDecision`];
//! - `reduce` folds the arrival-ordered [`ResultSet`] into the final value.
//!
//! Job failures travel as data inside [`JobResult`]; a task decides in
//! `reduce` whether to re-raise them.
//!
//! - [`job`] defines [`Job`], [`JobContext`] and [`JobFailure`].
//! - [`assignment`] defines [`JobAssignment`].
//! - [`result`] defines [`JobResult`] and [`ResultSet`].
//! - [`single`] provides the single-target template used by node diagnostics.

pub mod assignment;
pub mod job;
pub mod result;
pub mod single;

pub use assignment::{AssignedJob, JobAssignment};
pub use job::{Job, JobContext, JobFailure};
pub use result::{JobResult, ResultSet};
pub use single::{SingleNode, SingleNodeTask, TargetNode};

use crate::errors::Result;
use crate::policy::PolicyDecision;
use crate::topology::{Node, NodeId, TopologySnapshot};
use crate::types::JobId;

/// Payload type produced by the jobs of task `T`.
pub type JobOutput<T> = <<T as Task>::Job as Job>::Output;

/// User-defined distributed work.
///
/// One task value can serve many concurrent sessions, so implementations keep
/// per-execution state out of `self`.
pub trait Task: Send + Sync + 'static {
    type Arg;
    type Job: Job;
    type Reduced: Send + 'static;

    /// Assign jobs to nodes of `topology`. Called exactly once per submission.
    fn map(
        &self,
        topology: &TopologySnapshot,
        arg: &Self::Arg,
    ) -> Result<JobAssignment<Self::Job>>;

    /// Continuation policy, called once per accepted result in arrival order.
    ///
    /// `received` already contains `result` as its last entry. The default
    /// waits for every job: failures are interpreted in `reduce`, not here.
    fn on_result(
        &self,
        result: &JobResult<JobOutput<Self>>,
        received: &ResultSet<JobOutput<Self>>,
    ) -> PolicyDecision {
        let _ = (result, received);
        PolicyDecision::Wait
    }

    /// Fold the collected results. Called exactly once.
    fn reduce(&self, results: ResultSet<JobOutput<Self>>) -> Result<Self::Reduced>;

    /// Pick the node a failed-over job moves to.
    ///
    /// `tried` lists every node the job has already been sent to, including
    /// `failed`. The default takes the first untried node of the snapshot.
    fn failover_node(
        &self,
        job: JobId,
        failed: &NodeId,
        topology: &TopologySnapshot,
        tried: &[NodeId],
    ) -> Option<Node> {
        let _ = (job, failed);
        topology
            .iter()
            .find(|node| !tried.contains(node.id()))
            .cloned()
    }
}

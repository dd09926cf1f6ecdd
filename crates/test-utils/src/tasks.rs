#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gridtask::errors::Result;
use gridtask::policy::PolicyDecision;
use gridtask::task::{
    Job, JobAssignment, JobContext, JobFailure, JobResult, ResultSet, SingleNodeTask, Task,
    TargetNode,
};
use gridtask::topology::{NodeId, TopologySnapshot};

/// Argument naming a single target node.
#[derive(Debug, Clone)]
pub struct TargetArg(pub NodeId);

impl TargetArg {
    pub fn new(id: &str) -> Self {
        Self(NodeId::from(id))
    }
}

impl TargetNode for TargetArg {
    fn target_node_id(&self) -> &NodeId {
        &self.0
    }
}

/// A job whose behaviour is fixed up front.
#[derive(Debug, Clone)]
pub enum ScriptedJob {
    /// Succeed with `"hello from <node id>"`.
    EchoNode,
    Succeed(String),
    Fail(JobFailure),
    /// Fail on `node`, echo everywhere else.
    FailOn { node: NodeId, failure: JobFailure },
}

impl Job for ScriptedJob {
    type Output = String;

    fn execute(&self, ctx: &JobContext) -> std::result::Result<String, JobFailure> {
        let here = ctx.node().id();
        match self {
            ScriptedJob::EchoNode => Ok(format!("hello from {here}")),
            ScriptedJob::Succeed(payload) => Ok(payload.clone()),
            ScriptedJob::Fail(failure) => Err(failure.clone()),
            ScriptedJob::FailOn { node, failure } if node == here => Err(failure.clone()),
            ScriptedJob::FailOn { .. } => Ok(format!("hello from {here}")),
        }
    }
}

/// Single-target task running one scripted job.
#[derive(Debug, Clone)]
pub struct ScriptedTask {
    job: ScriptedJob,
}

impl ScriptedTask {
    pub fn echo() -> Self {
        Self {
            job: ScriptedJob::EchoNode,
        }
    }

    pub fn succeeding(payload: &str) -> Self {
        Self {
            job: ScriptedJob::Succeed(payload.to_string()),
        }
    }

    pub fn failing(failure: JobFailure) -> Self {
        Self {
            job: ScriptedJob::Fail(failure),
        }
    }
}

impl SingleNodeTask for ScriptedTask {
    type Arg = TargetArg;
    type Job = ScriptedJob;

    fn job(&self, _arg: &TargetArg) -> ScriptedJob {
        self.job.clone()
    }
}

type PolicyFn = dyn Fn(&JobResult<String>, &ResultSet<String>) -> PolicyDecision + Send + Sync;

/// Multi-node task sending one job to every node of the snapshot.
///
/// Jobs echo their node unless scripted otherwise per node. The continuation
/// policy is pluggable, and `map`/`reduce` invocations are counted.
pub struct FanOutTask {
    scripts: HashMap<NodeId, ScriptedJob>,
    policy: Arc<PolicyFn>,
    maps: AtomicUsize,
    reduces: AtomicUsize,
}

impl FanOutTask {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            policy: Arc::new(|_, _| PolicyDecision::Wait),
            maps: AtomicUsize::new(0),
            reduces: AtomicUsize::new(0),
        }
    }

    pub fn with_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&JobResult<String>, &ResultSet<String>) -> PolicyDecision + Send + Sync + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    /// Assign `job` instead of an echo job to `node`.
    pub fn with_job(mut self, node: &str, job: ScriptedJob) -> Self {
        self.scripts.insert(NodeId::from(node), job);
        self
    }

    pub fn map_calls(&self) -> usize {
        self.maps.load(Ordering::SeqCst)
    }

    pub fn reduce_calls(&self) -> usize {
        self.reduces.load(Ordering::SeqCst)
    }
}

impl Default for FanOutTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for FanOutTask {
    type Arg = ();
    type Job = ScriptedJob;
    /// Per-node outcomes in arrival order.
    type Reduced = Vec<(NodeId, std::result::Result<String, JobFailure>)>;

    fn map(&self, topology: &TopologySnapshot, _arg: &()) -> Result<JobAssignment<ScriptedJob>> {
        self.maps.fetch_add(1, Ordering::SeqCst);

        let mut assignment = JobAssignment::new();
        for node in topology.iter() {
            let job = self
                .scripts
                .get(node.id())
                .cloned()
                .unwrap_or(ScriptedJob::EchoNode);
            assignment.assign(job, node);
        }
        Ok(assignment)
    }

    fn on_result(&self, result: &JobResult<String>, received: &ResultSet<String>) -> PolicyDecision {
        (self.policy)(result, received)
    }

    fn reduce(&self, results: ResultSet<String>) -> Result<Self::Reduced> {
        self.reduces.fetch_add(1, Ordering::SeqCst);
        Ok(results
            .into_iter()
            .map(|res| (res.node().clone(), res.into_outcome()))
            .collect())
    }
}

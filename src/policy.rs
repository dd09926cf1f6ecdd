// src/policy.rs

//! Result policy evaluation.
//!
//! After every accepted job result the session asks the task what to do next.
//! The answer is a [`PolicyDecision`]; evaluation is pure and keeps no state
//! beyond the result set the session already owns. The helpers below are
//! building blocks for `Task::on_result` implementations.

use tracing::debug;

use crate::task::{JobOutput, JobResult, ResultSet, Task};
use crate::types::SessionId;

/// What the session does after a job result arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Keep collecting; reduce automatically once every job has reported.
    Wait,
    /// Reduce now with whatever has arrived; later results are discarded.
    Reduce,
    /// Re-dispatch the job of this result to another node.
    Failover,
}

/// Wait for every job regardless of outcome.
pub fn wait_for_all<T>(_result: &JobResult<T>, _received: &ResultSet<T>) -> PolicyDecision {
    PolicyDecision::Wait
}

/// Reduce as soon as `quorum` successful results are in.
pub fn reduce_on_quorum<T>(received: &ResultSet<T>, quorum: usize) -> PolicyDecision {
    if received.successes() >= quorum {
        PolicyDecision::Reduce
    } else {
        PolicyDecision::Wait
    }
}

/// Fail a job over whenever it reports a failure.
pub fn failover_on_failure<T>(result: &JobResult<T>) -> PolicyDecision {
    if result.is_failure() {
        PolicyDecision::Failover
    } else {
        PolicyDecision::Wait
    }
}

/// Ask `task` for its decision on the latest result.
pub(crate) fn evaluate<T: Task>(
    task: &T,
    session: SessionId,
    latest: &JobResult<JobOutput<T>>,
    received: &ResultSet<JobOutput<T>>,
) -> PolicyDecision {
    let decision = task.on_result(latest, received);
    debug!(
        %session,
        job = %latest.job(),
        node = %latest.node(),
        failed = latest.is_failure(),
        received = received.len(),
        ?decision,
        "result policy evaluated"
    );
    decision
}

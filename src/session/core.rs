// src/session/core.rs

//! Pure session state machine.
//!
//! `SessionCore` holds everything one task execution needs between `map` and
//! `reduce`: the outstanding dispatches, the arrival-ordered result set and
//! the task whose policy hook is consulted. It consumes [`SessionEvent`]s and
//! returns [`SessionStep`]s telling the async shell what to do next.
//!
//! It has **no** channels, no Tokio types, and does not perform any IO, so
//! tests can drive it event by event.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{MappingError, Result};
use crate::policy::{self, PolicyDecision};
use crate::session::{
    PendingDispatch, SessionCommand, SessionEvent, SessionOptions, SessionStep,
};
use crate::task::{JobFailure, JobOutput, JobResult, ResultSet, Task};
use crate::topology::{Node, NodeId, TopologySnapshot};
use crate::types::{DispatchHandle, JobId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Collecting,
    Reduced,
}

/// A dispatched job still expected to report.
struct Outstanding<J> {
    job_id: JobId,
    job: Arc<J>,
    node: Node,
    /// Nodes this job has been sent to so far.
    tried: Vec<NodeId>,
    failovers: usize,
}

pub struct SessionCore<T: Task> {
    id: SessionId,
    task: Arc<T>,
    topology: Arc<TopologySnapshot>,
    options: SessionOptions,
    outstanding: HashMap<DispatchHandle, Outstanding<T::Job>>,
    results: ResultSet<JobOutput<T>>,
    next_handle: u64,
    phase: Phase,
}

impl<T: Task> fmt::Debug for SessionCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCore")
            .field("id", &self.id)
            .field("outstanding", &self.outstanding.len())
            .field("results", &self.results.len())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl<T: Task> SessionCore<T> {
    /// Map `task` onto `topology` and prepare the initial dispatches.
    ///
    /// Any mapping failure is returned here, before a single job has been
    /// handed out.
    pub fn start(
        task: Arc<T>,
        arg: &T::Arg,
        topology: Arc<TopologySnapshot>,
        options: SessionOptions,
    ) -> Result<(Self, SessionStep<T::Job>)> {
        let id = SessionId::next();

        if topology.is_empty() {
            warn!(session = %id, "refusing to map task onto an empty topology");
            return Err(MappingError::EmptyTopology.into());
        }

        let assignment = task.map(&topology, arg).inspect_err(|err| {
            warn!(session = %id, error = %err, "task mapping failed; nothing dispatched");
        })?;

        if assignment.is_empty() {
            warn!(session = %id, "task mapped to zero jobs");
            return Err(MappingError::EmptyAssignment.into());
        }

        if let Some(stray) = assignment
            .iter()
            .find(|entry| !topology.contains(entry.node.id()))
        {
            return Err(MappingError::NodeNotInTopology {
                job: stray.id,
                node: stray.node.id().clone(),
            }
            .into());
        }

        let mut core = Self {
            id,
            task,
            topology,
            options,
            outstanding: HashMap::new(),
            results: ResultSet::new(),
            next_handle: 0,
            phase: Phase::Collecting,
        };

        let mut dispatches = Vec::with_capacity(assignment.len());
        for entry in assignment.into_entries() {
            let handle = core.allocate_handle();
            debug!(
                session = %id,
                job = %entry.id,
                node = %entry.node.id(),
                %handle,
                "job assigned"
            );
            dispatches.push(PendingDispatch {
                handle,
                job_id: entry.id,
                job: Arc::clone(&entry.job),
                node: entry.node.clone(),
            });
            core.outstanding.insert(
                handle,
                Outstanding {
                    job_id: entry.id,
                    job: entry.job,
                    node: entry.node,
                    tried: Vec::new(),
                    failovers: 0,
                },
            );
        }

        info!(session = %id, jobs = dispatches.len(), "task mapped; dispatching jobs");

        let step = SessionStep {
            commands: vec![SessionCommand::Dispatch(dispatches)],
            keep_running: true,
        };
        Ok((core, step))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn task(&self) -> Arc<T> {
        Arc::clone(&self.task)
    }

    /// Number of dispatches still expected to report.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Results accepted so far, in arrival order.
    pub fn results(&self) -> &ResultSet<JobOutput<T>> {
        &self.results
    }

    /// Whether the session stopped collecting and is ready to reduce.
    pub fn is_reduced(&self) -> bool {
        self.phase == Phase::Reduced
    }

    /// Hand the accumulated results over for reduction.
    pub fn into_results(self) -> ResultSet<JobOutput<T>> {
        self.results
    }

    /// Handle a single event, updating state and returning the commands the
    /// shell should execute.
    pub fn step(&mut self, event: SessionEvent<JobOutput<T>>) -> SessionStep<T::Job> {
        match event {
            SessionEvent::ResultArrived { handle, result } => self.handle_result(handle, result),
            SessionEvent::DispatchFailed { handle, cause } => {
                warn!(
                    session = %self.id,
                    %handle,
                    error = %cause,
                    "dispatch failed; recording as job failure"
                );
                self.handle_lost(handle, || cause)
            }
            SessionEvent::ReplyDropped { handle } => self.handle_lost(handle, || {
                JobFailure::msg(format!(
                    "transport dropped {handle} without delivering a result"
                ))
            }),
        }
    }

    /// Turn a dispatch that can no longer report into a failed result.
    fn handle_lost(
        &mut self,
        handle: DispatchHandle,
        cause: impl FnOnce() -> JobFailure,
    ) -> SessionStep<T::Job> {
        let Some(pending) = self.outstanding.get(&handle) else {
            return self.discard(handle, "no outstanding job for lost dispatch");
        };

        let result = JobResult::failure(pending.job_id, pending.node.id().clone(), cause());
        self.handle_result(handle, result)
    }

    fn handle_result(
        &mut self,
        handle: DispatchHandle,
        result: JobResult<JobOutput<T>>,
    ) -> SessionStep<T::Job> {
        if self.phase == Phase::Reduced {
            return self.discard(handle, "session already reduced; discarding late job result");
        }

        let Some(pending) = self.outstanding.remove(&handle) else {
            return self.discard(handle, "duplicate or retired dispatch handle; discarding result");
        };

        if pending.job_id != result.job() {
            warn!(
                session = %self.id,
                %handle,
                expected = %pending.job_id,
                got = %result.job(),
                "result does not belong to this dispatch; discarding"
            );
            self.outstanding.insert(handle, pending);
            return SessionStep::idle(true);
        }

        debug!(
            session = %self.id,
            job = %result.job(),
            node = %result.node(),
            %handle,
            failed = result.is_failure(),
            "job result accepted"
        );
        self.results.push(result);

        let decision = match self.results.last() {
            Some(latest) => policy::evaluate(&*self.task, self.id, latest, &self.results),
            None => PolicyDecision::Wait,
        };

        match decision {
            PolicyDecision::Wait => self.check_completion(),
            PolicyDecision::Reduce => {
                info!(
                    session = %self.id,
                    outstanding = self.outstanding.len(),
                    "policy requested reduce; remaining results will be discarded"
                );
                self.finish()
            }
            PolicyDecision::Failover => self.failover(handle, pending),
        }
    }

    /// Re-dispatch the job behind the latest (failed) result.
    fn failover(
        &mut self,
        retired: DispatchHandle,
        mut pending: Outstanding<T::Job>,
    ) -> SessionStep<T::Job> {
        if pending.failovers >= self.options.failover_attempts {
            warn!(
                session = %self.id,
                job = %pending.job_id,
                attempts = pending.failovers,
                "failover attempts exhausted; keeping result"
            );
            return self.check_completion();
        }

        let failed = pending.node.id().clone();
        if !pending.tried.contains(&failed) {
            pending.tried.push(failed.clone());
        }

        let target = self
            .task
            .failover_node(pending.job_id, &failed, &self.topology, &pending.tried)
            .filter(|node| self.topology.contains(node.id()));

        let Some(node) = target else {
            warn!(
                session = %self.id,
                job = %pending.job_id,
                from = %failed,
                "no node left to fail over to; keeping result"
            );
            return self.check_completion();
        };

        // The job reports again from its new node.
        self.results.pop();

        let handle = self.allocate_handle();
        info!(
            session = %self.id,
            job = %pending.job_id,
            from = %failed,
            to = %node.id(),
            %retired,
            %handle,
            "failing over job"
        );

        pending.failovers += 1;
        pending.tried.push(node.id().clone());
        pending.node = node.clone();

        let dispatch = PendingDispatch {
            handle,
            job_id: pending.job_id,
            job: Arc::clone(&pending.job),
            node,
        };
        self.outstanding.insert(handle, pending);

        SessionStep {
            commands: vec![SessionCommand::Dispatch(vec![dispatch])],
            keep_running: true,
        }
    }

    fn check_completion(&mut self) -> SessionStep<T::Job> {
        if self.outstanding.is_empty() {
            info!(
                session = %self.id,
                results = self.results.len(),
                "all jobs reported; reducing"
            );
            self.finish()
        } else {
            SessionStep::idle(true)
        }
    }

    fn finish(&mut self) -> SessionStep<T::Job> {
        self.phase = Phase::Reduced;
        self.outstanding.clear();

        SessionStep {
            commands: vec![SessionCommand::Reduce],
            keep_running: false,
        }
    }

    fn discard(&self, handle: DispatchHandle, reason: &str) -> SessionStep<T::Job> {
        debug!(session = %self.id, %handle, "{reason}");
        SessionStep::idle(self.phase == Phase::Collecting)
    }

    fn allocate_handle(&mut self) -> DispatchHandle {
        let handle = DispatchHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

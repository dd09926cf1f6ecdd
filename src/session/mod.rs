// src/session/mod.rs

//! Task sessions: driving one task from submission to reduction.
//!
//! Jobs complete remotely, concurrently and out of order; the task contract
//! is sequential. A session bridges the two:
//! - [`core`] is the pure state machine. It maps the task, tracks outstanding
//!   dispatches, accepts each job's first result, consults the result policy
//!   and decides when to reduce.
//! - [`runtime`] is the async shell that owns one core, feeds it events from
//!   a channel, and carries out its commands through a [`Transport`].
//! - [`coordinator`] is the caller-facing API: submit a task, get a
//!   [`TaskHandle`], await (or stop awaiting) the reduced value.
//!
//! [`Transport`]: crate::transport::Transport

use std::sync::Arc;

use crate::config::EngineSection;
use crate::task::{JobFailure, JobResult};
use crate::topology::Node;
use crate::types::{DispatchHandle, JobId};

pub mod coordinator;
pub mod core;
pub mod runtime;

pub use coordinator::{Coordinator, TaskHandle};
pub use self::core::SessionCore;

/// Default cap on re-dispatches per job.
pub const DEFAULT_FAILOVER_ATTEMPTS: usize = 5;

/// Per-session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Maximum number of times one job may be failed over.
    pub failover_attempts: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            failover_attempts: DEFAULT_FAILOVER_ATTEMPTS,
        }
    }
}

impl From<&EngineSection> for SessionOptions {
    fn from(engine: &EngineSection) -> Self {
        Self {
            failover_attempts: engine.failover_attempts,
        }
    }
}

/// Events flowing into a session from its transport.
#[derive(Debug)]
pub enum SessionEvent<T> {
    /// A job reported its outcome.
    ResultArrived {
        handle: DispatchHandle,
        result: JobResult<T>,
    },
    /// The transport refused the dispatch.
    DispatchFailed {
        handle: DispatchHandle,
        cause: JobFailure,
    },
    /// Every reply handle for a dispatch was dropped without a delivery.
    ReplyDropped { handle: DispatchHandle },
}

impl<T> SessionEvent<T> {
    pub fn handle(&self) -> DispatchHandle {
        match self {
            SessionEvent::ResultArrived { handle, .. }
            | SessionEvent::DispatchFailed { handle, .. }
            | SessionEvent::ReplyDropped { handle } => *handle,
        }
    }
}

/// A job the shell must hand to the transport.
pub struct PendingDispatch<J> {
    pub handle: DispatchHandle,
    pub job_id: JobId,
    pub job: Arc<J>,
    pub node: Node,
}

impl<J> std::fmt::Debug for PendingDispatch<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingDispatch")
            .field("handle", &self.handle)
            .field("job_id", &self.job_id)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Command produced by the core, executed by the async shell.
#[derive(Debug)]
pub enum SessionCommand<J> {
    /// Send these jobs to the transport.
    Dispatch(Vec<PendingDispatch<J>>),
    /// Stop collecting and reduce the accumulated results.
    Reduce,
}

/// Outcome of feeding one event into the core.
#[derive(Debug)]
pub struct SessionStep<J> {
    /// Commands the shell should execute.
    pub commands: Vec<SessionCommand<J>>,
    /// Whether the shell should keep waiting for events.
    pub keep_running: bool,
}

impl<J> SessionStep<J> {
    pub(crate) fn idle(keep_running: bool) -> Self {
        Self {
            commands: Vec::new(),
            keep_running,
        }
    }
}

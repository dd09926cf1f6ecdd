// src/transport/mod.rs

//! Pluggable job transport.
//!
//! A session never moves jobs itself: it hands each [`Dispatch`] to a
//! [`Transport`] and gets the outcome back through the [`ResultSender`]
//! carried by that dispatch. This makes it easy to swap in a scripted
//! transport in tests while keeping the in-process implementation in
//! [`local`].
//!
//! Delivery contract:
//! - `deliver` is a non-blocking callback; it may be called from any task.
//! - Deliveries after the first one for a dispatch are discarded by the
//!   session, as are deliveries arriving after the session reduced.
//! - Dropping every clone of a sender without delivering reports the job as
//!   failed instead of leaving the session waiting forever.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::Result;
use crate::session::SessionEvent;
use crate::task::{Job, JobFailure, JobResult};
use crate::topology::{Node, NodeId};
use crate::types::{DispatchHandle, JobId, SessionId};

pub mod local;

pub use local::LocalTransport;

/// Trait abstracting how jobs reach their nodes.
pub trait Transport<J: Job>: Send + Sync + 'static {
    /// Hand one job to the transport.
    ///
    /// Returning `Err` means the job never left; the session records it as a
    /// failed result for that job. Execution itself must not be awaited here.
    fn dispatch(
        &self,
        dispatch: Dispatch<J>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// A job bound for a node, plus the handle used to report its outcome.
pub struct Dispatch<J: Job> {
    pub session: SessionId,
    pub handle: DispatchHandle,
    pub job_id: JobId,
    pub job: Arc<J>,
    pub node: Node,
    pub reply: ResultSender<J::Output>,
}

impl<J: Job> fmt::Debug for Dispatch<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("session", &self.session)
            .field("handle", &self.handle)
            .field("job_id", &self.job_id)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

struct ReplyInner<T> {
    session: SessionId,
    handle: DispatchHandle,
    job: JobId,
    node: NodeId,
    delivered: AtomicBool,
    tx: mpsc::UnboundedSender<SessionEvent<T>>,
}

impl<T> Drop for ReplyInner<T> {
    fn drop(&mut self) {
        if !self.delivered.load(Ordering::Acquire) {
            let _ = self.tx.send(SessionEvent::ReplyDropped {
                handle: self.handle,
            });
        }
    }
}

/// Callback handle for reporting one dispatch's outcome back to its session.
pub struct ResultSender<T> {
    inner: Arc<ReplyInner<T>>,
}

impl<T> Clone for ResultSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ResultSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSender")
            .field("session", &self.inner.session)
            .field("handle", &self.inner.handle)
            .field("job", &self.inner.job)
            .field("node", &self.inner.node)
            .finish()
    }
}

impl<T> ResultSender<T> {
    pub(crate) fn new(
        session: SessionId,
        handle: DispatchHandle,
        job: JobId,
        node: NodeId,
        tx: mpsc::UnboundedSender<SessionEvent<T>>,
    ) -> Self {
        Self {
            inner: Arc::new(ReplyInner {
                session,
                handle,
                job,
                node,
                delivered: AtomicBool::new(false),
                tx,
            }),
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.inner.handle
    }

    pub fn job_id(&self) -> JobId {
        self.inner.job
    }

    pub fn node(&self) -> &NodeId {
        &self.inner.node
    }

    /// Report the job's outcome.
    ///
    /// Returns `false` when the session is gone (it already reduced and
    /// stopped listening); the outcome is then discarded.
    pub fn deliver(&self, outcome: std::result::Result<T, JobFailure>) -> bool {
        self.inner.delivered.store(true, Ordering::Release);

        let result = JobResult::new(self.inner.job, self.inner.node.clone(), outcome);
        let event = SessionEvent::ResultArrived {
            handle: self.inner.handle,
            result,
        };

        match self.inner.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!(
                    session = %self.inner.session,
                    handle = %self.inner.handle,
                    job = %self.inner.job,
                    "session already completed; discarding job result"
                );
                false
            }
        }
    }

    pub fn success(&self, payload: T) -> bool {
        self.deliver(Ok(payload))
    }

    pub fn failure(&self, failure: JobFailure) -> bool {
        self.deliver(Err(failure))
    }
}

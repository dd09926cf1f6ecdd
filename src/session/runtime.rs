// src/session/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{GridError, Result};
use crate::task::{JobFailure, JobOutput, Task};
use crate::transport::{Dispatch, ResultSender, Transport};

use super::core::SessionCore;
use super::{PendingDispatch, SessionCommand, SessionEvent, SessionStep};

/// Drives one [`SessionCore`] in response to [`SessionEvent`]s and delegates
/// job movement to a [`Transport`].
///
/// This is a pure IO shell: the core decides, the shell dispatches and
/// listens. Events from every job funnel through one channel consumed by one
/// loop, so result handling and the completion check never interleave.
/// `reduce` runs after the loop has stopped listening.
pub struct SessionRuntime<T: Task, X> {
    core: SessionCore<T>,
    transport: Arc<X>,
    event_tx: mpsc::UnboundedSender<SessionEvent<JobOutput<T>>>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent<JobOutput<T>>>,
    /// Events raised by the shell itself (refused dispatches); handled before
    /// anything waiting in the channel.
    backlog: VecDeque<SessionEvent<JobOutput<T>>>,
}

impl<T: Task, X> fmt::Debug for SessionRuntime<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("core", &self.core)
            .field("backlog", &self.backlog.len())
            .finish_non_exhaustive()
    }
}

impl<T, X> SessionRuntime<T, X>
where
    T: Task,
    X: Transport<T::Job>,
{
    pub fn new(core: SessionCore<T>, transport: Arc<X>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            core,
            transport,
            event_tx,
            event_rx,
            backlog: VecDeque::new(),
        }
    }

    /// Main event loop.
    ///
    /// - Executes the initial dispatch step produced by mapping.
    /// - Feeds every incoming event into the core.
    /// - Executes the commands returned by the core.
    /// - Reduces once the core stops.
    pub async fn run(mut self, initial: SessionStep<T::Job>) -> Result<T::Reduced> {
        let session = self.core.id();
        info!(%session, "task session started");

        let mut keep_running = self.apply(initial).await;

        while keep_running {
            let Some(event) = self.next_event().await else {
                return Err(GridError::Other(anyhow!(
                    "event channel of {session} closed unexpectedly"
                )));
            };

            debug!(%session, handle = %event.handle(), "session received event");

            let step = self.core.step(event);
            keep_running = self.apply(step).await;
        }

        self.reduce()
    }

    async fn next_event(&mut self) -> Option<SessionEvent<JobOutput<T>>> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        self.event_rx.recv().await
    }

    /// Execute the commands of one core step; returns `keep_running`.
    async fn apply(&mut self, step: SessionStep<T::Job>) -> bool {
        for command in step.commands {
            match command {
                SessionCommand::Dispatch(jobs) => {
                    for job in jobs {
                        self.dispatch(job).await;
                    }
                }
                SessionCommand::Reduce => {
                    debug!(session = %self.core.id(), "core issued Reduce command");
                }
            }
        }
        step.keep_running
    }

    async fn dispatch(&mut self, pending: PendingDispatch<T::Job>) {
        let session = self.core.id();
        let handle = pending.handle;

        let reply = ResultSender::new(
            session,
            handle,
            pending.job_id,
            pending.node.id().clone(),
            self.event_tx.clone(),
        );
        let dispatch = Dispatch {
            session,
            handle,
            job_id: pending.job_id,
            job: pending.job,
            node: pending.node,
            reply,
        };

        if let Err(err) = self.transport.dispatch(dispatch).await {
            warn!(%session, %handle, error = %err, "transport refused dispatch");
            self.backlog.push_back(SessionEvent::DispatchFailed {
                handle,
                cause: JobFailure::new(err),
            });
        }
    }

    fn reduce(self) -> Result<T::Reduced> {
        let session = self.core.id();
        let task = self.core.task();
        let results = self.core.into_results();
        let count = results.len();

        match task.reduce(results) {
            Ok(reduced) => {
                info!(%session, results = count, "task reduced");
                Ok(reduced)
            }
            Err(err) => {
                warn!(%session, results = count, error = %err, "task reduce failed");
                Err(err)
            }
        }
    }
}

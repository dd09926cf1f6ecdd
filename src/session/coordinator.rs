// src/session/coordinator.rs

//! Caller-facing entry point for running tasks.

use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::errors::{GridError, Result};
use crate::task::Task;
use crate::topology::TopologySnapshot;
use crate::transport::Transport;
use crate::types::SessionId;

use super::SessionOptions;
use super::core::SessionCore;
use super::runtime::SessionRuntime;

/// Submits tasks and spawns one session per submission.
///
/// Many sessions may be in flight at once; they share the task value and the
/// transport but nothing else.
pub struct Coordinator<T, X> {
    task: Arc<T>,
    transport: Arc<X>,
    options: SessionOptions,
}

impl<T, X> fmt::Debug for Coordinator<T, X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T, X> Coordinator<T, X>
where
    T: Task,
    X: Transport<T::Job>,
{
    pub fn new(task: T, transport: X) -> Self {
        Self::from_shared(Arc::new(task), Arc::new(transport))
    }

    /// Build a coordinator around a task and transport the caller keeps
    /// handles to.
    pub fn from_shared(task: Arc<T>, transport: Arc<X>) -> Self {
        Self {
            task,
            transport,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn task(&self) -> &Arc<T> {
        &self.task
    }

    pub fn transport(&self) -> &Arc<X> {
        &self.transport
    }

    /// Map `task` onto `topology` and start executing it.
    ///
    /// Mapping happens synchronously: a mapping failure is returned here and
    /// nothing is dispatched. Otherwise the session runs on its own Tokio
    /// task and the returned handle yields the reduced value.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(
        &self,
        arg: &T::Arg,
        topology: Arc<TopologySnapshot>,
    ) -> Result<TaskHandle<T::Reduced>> {
        let (core, initial) =
            SessionCore::start(Arc::clone(&self.task), arg, topology, self.options)?;
        let session = core.id();

        let (result_tx, result_rx) = oneshot::channel();
        let runtime = SessionRuntime::new(core, Arc::clone(&self.transport));

        tokio::spawn(async move {
            let outcome = runtime.run(initial).await;
            if result_tx.send(outcome).is_err() {
                debug!(%session, "caller stopped waiting; dropping task result");
            }
        });

        Ok(TaskHandle { session, result_rx })
    }

    /// Submit and wait for the reduced value.
    pub async fn execute(
        &self,
        arg: &T::Arg,
        topology: Arc<TopologySnapshot>,
    ) -> Result<T::Reduced> {
        self.submit(arg, topology)?.join().await
    }
}

/// Handle to one submitted task.
///
/// Dropping the handle stops waiting but does not retract dispatched jobs:
/// the session still collects and reduces in the background.
pub struct TaskHandle<R> {
    session: SessionId,
    result_rx: oneshot::Receiver<Result<R>>,
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<R> TaskHandle<R> {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Wait for the reduced value or the task's failure.
    pub async fn join(self) -> Result<R> {
        let session = self.session;
        match self.result_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(GridError::Other(anyhow!(
                "{session} ended without producing a result"
            ))),
        }
    }

    /// Wait like [`join`](Self::join), giving up when `cancel` fires.
    ///
    /// A dropped `cancel` sender is not a cancellation.
    pub async fn join_with_cancel(self, cancel: oneshot::Receiver<()>) -> Result<R> {
        let session = self.session;

        tokio::select! {
            outcome = self.join() => outcome,
            Ok(()) = cancel => {
                info!(%session, "caller cancelled wait; dispatched jobs keep running");
                Err(GridError::Cancelled)
            }
        }
    }
}

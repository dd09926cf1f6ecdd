use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::Notify;

use gridtask::errors::{GridError, Result};
use gridtask::task::Job;
use gridtask::topology::NodeId;
use gridtask::transport::{Dispatch, Transport};

/// A transport that never runs anything by itself.
///
/// - records every dispatch it accepts, reply handle included, so the test
///   decides when and how each job reports;
/// - refuses dispatches to nodes marked with [`refuse`](Self::refuse).
pub struct ManualTransport<J: Job> {
    dispatched: Mutex<Vec<Dispatch<J>>>,
    history: Mutex<Vec<NodeId>>,
    refused: Mutex<HashSet<NodeId>>,
    notify: Notify,
}

impl<J: Job> ManualTransport<J> {
    pub fn new() -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            refused: Mutex::new(HashSet::new()),
            notify: Notify::new(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn refuse(&self, node: &str) {
        self.refused.lock().unwrap().insert(NodeId::from(node));
    }

    /// Every node a dispatch was attempted to, in order, refusals included.
    pub fn history(&self) -> Vec<NodeId> {
        self.history.lock().unwrap().clone()
    }

    /// Take the accepted dispatches collected so far.
    pub fn take_dispatches(&self) -> Vec<Dispatch<J>> {
        std::mem::take(&mut *self.dispatched.lock().unwrap())
    }

    /// Wait until at least `count` dispatches are waiting, then take them all.
    pub async fn wait_for_dispatches(&self, count: usize) -> Vec<Dispatch<J>> {
        loop {
            let notified = self.notify.notified();
            if self.dispatched.lock().unwrap().len() >= count {
                return self.take_dispatches();
            }
            notified.await;
        }
    }
}

impl<J: Job> Default for ManualTransport<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: Job> Transport<J> for ManualTransport<J> {
    fn dispatch(
        &self,
        dispatch: Dispatch<J>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let node = dispatch.node.id().clone();
            self.history.lock().unwrap().push(node.clone());

            if self.refused.lock().unwrap().contains(&node) {
                return Err(GridError::Transport(anyhow!("node '{node}' refused the job")));
            }

            self.dispatched.lock().unwrap().push(dispatch);
            self.notify.notify_waiters();
            Ok(())
        })
    }
}

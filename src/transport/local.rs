// src/transport/local.rs

//! In-process transport.
//!
//! Every node of a topology gets a [`JobContext`]; dispatching a job spawns a
//! Tokio task that runs `Job::execute` against that context on the blocking
//! pool and delivers the outcome. Node departure and per-node latency can be
//! simulated, which is how partial failure is exercised without a network.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::errors::{GridError, Result};
use crate::task::{Job, JobContext, JobFailure};
use crate::topology::{NodeId, TopologySnapshot};
use crate::transport::{Dispatch, Transport};

#[derive(Debug, Default)]
struct NodeConditions {
    departed: HashSet<NodeId>,
    latency: HashMap<NodeId, Duration>,
}

/// Transport executing jobs on Tokio tasks inside this process.
#[derive(Debug)]
pub struct LocalTransport {
    contexts: HashMap<NodeId, JobContext>,
    conditions: Arc<Mutex<NodeConditions>>,
}

impl LocalTransport {
    /// One execution context per node of `topology`.
    pub fn new(topology: &TopologySnapshot) -> Self {
        let contexts = topology
            .iter()
            .map(|node| (node.id().clone(), JobContext::new(node.clone())))
            .collect();

        Self {
            contexts,
            conditions: Arc::new(Mutex::new(NodeConditions::default())),
        }
    }

    /// Attach a node-local resource that jobs on `node` can look up.
    pub fn with_resource<R>(mut self, node: &NodeId, resource: R) -> Self
    where
        R: std::any::Any + Send + Sync,
    {
        if let Some(ctx) = self.contexts.remove(node) {
            self.contexts
                .insert(node.clone(), ctx.with_resource(resource));
        } else {
            warn!(node = %node, "resource attached to unknown node; ignoring");
        }
        self
    }

    /// Delay every job on `node` by `latency` before it executes.
    pub fn with_latency(self, node: &NodeId, latency: Duration) -> Self {
        self.lock_conditions().latency.insert(node.clone(), latency);
        self
    }

    /// Simulate `node` leaving the cluster.
    ///
    /// New dispatches to it are refused; jobs still waiting out their latency
    /// on it report a failure instead of executing.
    pub fn depart(&self, node: &NodeId) {
        info!(node = %node, "node departed from local transport");
        self.lock_conditions().departed.insert(node.clone());
    }

    pub fn rejoin(&self, node: &NodeId) {
        info!(node = %node, "node rejoined local transport");
        self.lock_conditions().departed.remove(node);
    }

    fn lock_conditions(&self) -> std::sync::MutexGuard<'_, NodeConditions> {
        self.conditions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<J: Job> Transport<J> for LocalTransport {
    fn dispatch(
        &self,
        dispatch: Dispatch<J>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let node_id = dispatch.node.id().clone();
        let ctx = self.contexts.get(&node_id).cloned();
        let (departed, latency) = {
            let conditions = self.lock_conditions();
            (
                conditions.departed.contains(&node_id),
                conditions.latency.get(&node_id).copied(),
            )
        };
        let conditions = Arc::clone(&self.conditions);

        Box::pin(async move {
            let Some(ctx) = ctx else {
                return Err(GridError::Transport(anyhow!(
                    "node '{node_id}' is unknown to the local transport"
                )));
            };
            if departed {
                return Err(GridError::Transport(anyhow!(
                    "node '{node_id}' has left the cluster"
                )));
            }

            debug!(
                session = %dispatch.session,
                handle = %dispatch.handle,
                job = %dispatch.job_id,
                node = %node_id,
                "job dispatched to local node"
            );

            tokio::spawn(async move {
                run_local_job(dispatch, ctx, latency, conditions).await;
            });

            Ok(())
        })
    }
}

async fn run_local_job<J: Job>(
    dispatch: Dispatch<J>,
    ctx: JobContext,
    latency: Option<Duration>,
    conditions: Arc<Mutex<NodeConditions>>,
) {
    if let Some(delay) = latency {
        tokio::time::sleep(delay).await;
    }

    let node_id = dispatch.node.id().clone();
    let departed = conditions
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .departed
        .contains(&node_id);
    if departed {
        warn!(
            handle = %dispatch.handle,
            node = %node_id,
            "node left the cluster before the job ran"
        );
        dispatch.reply.failure(JobFailure::msg(format!(
            "node '{node_id}' left the cluster while executing {}",
            dispatch.job_id
        )));
        return;
    }

    let job = Arc::clone(&dispatch.job);
    let outcome = match tokio::task::spawn_blocking(move || job.execute(&ctx)).await {
        Ok(outcome) => outcome,
        Err(join_err) => Err(JobFailure::msg(format!(
            "{} panicked on node '{node_id}': {join_err}",
            dispatch.job_id
        ))),
    };

    debug!(
        handle = %dispatch.handle,
        node = %node_id,
        failed = outcome.is_err(),
        "local job finished"
    );
    dispatch.reply.deliver(outcome);
}

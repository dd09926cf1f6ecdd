// src/diag/tx.rs

//! Cluster-wide transaction listing.
//!
//! `TxTask` sends one job to every node selected by the argument's
//! projection. Each job filters the node's [`TxLog`] by minimum duration,
//! minimum size and label pattern, sorts, and truncates to the limit.
//! Reduction keeps every node's outcome, failures included, in arrival
//! order: a node that cannot answer does not hide the others.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{GridError, MappingError, Result};
use crate::task::{Job, JobAssignment, JobContext, JobFailure, ResultSet, Task};
use crate::topology::{Node, NodeId, TopologySnapshot};

/// Ordering of the transactions reported per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxSortOrder {
    /// Longest running first.
    #[default]
    Duration,
    /// Most operations first.
    Size,
    /// Oldest first.
    StartTime,
}

impl FromStr for TxSortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DURATION" => Ok(TxSortOrder::Duration),
            "SIZE" => Ok(TxSortOrder::Size),
            "START_TIME" => Ok(TxSortOrder::StartTime),
            other => Err(format!(
                "invalid sort order: {other} (expected DURATION, SIZE or START_TIME)"
            )),
        }
    }
}

/// Which nodes a transaction query runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxProjection {
    Servers,
    Clients,
    Nodes(Vec<NodeId>),
}

impl fmt::Display for TxProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxProjection::Servers => f.write_str("servers"),
            TxProjection::Clients => f.write_str("clients"),
            TxProjection::Nodes(ids) => {
                let ids: Vec<&str> = ids.iter().map(NodeId::as_str).collect();
                write!(f, "nodes {}", ids.join(","))
            }
        }
    }
}

/// Argument of [`TxTask`].
///
/// With no projection the query runs on every node of the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxTaskArg {
    pub min_duration: Option<Duration>,
    pub min_size: Option<usize>,
    /// Regular expression a transaction label must match.
    pub label: Option<String>,
    pub limit: Option<usize>,
    pub order: TxSortOrder,
    pub projection: Option<TxProjection>,
}

impl TxTaskArg {
    /// Reject arguments no node could evaluate.
    pub fn validate(&self) -> Result<()> {
        self.label_regex()?;

        if self.limit == Some(0) {
            return Err(GridError::InvalidArgument(
                "limit must be positive".to_string(),
            ));
        }

        if let Some(TxProjection::Nodes(ids)) = &self.projection {
            if ids.is_empty() {
                return Err(GridError::InvalidArgument(
                    "explicit node projection must list at least one node".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn label_regex(&self) -> Result<Option<Regex>> {
        match &self.label {
            None => Ok(None),
            Some(pattern) => Regex::new(pattern).map(Some).map_err(|err| {
                GridError::InvalidArgument(format!("invalid label pattern '{pattern}': {err}"))
            }),
        }
    }

    /// Nodes of `topology` the query must run on, in snapshot order.
    ///
    /// Explicitly listed IDs must all be present.
    pub fn select_nodes<'a>(&self, topology: &'a TopologySnapshot) -> Result<Vec<&'a Node>> {
        let nodes: Vec<&Node> = match &self.projection {
            None => topology.iter().collect(),
            Some(TxProjection::Servers) => topology.servers().collect(),
            Some(TxProjection::Clients) => topology.clients().collect(),
            Some(TxProjection::Nodes(ids)) => {
                if let Some(missing) = ids.iter().find(|id| !topology.contains(id)) {
                    return Err(MappingError::NodeNotFound {
                        id: missing.clone(),
                        topology: topology.clone(),
                    }
                    .into());
                }
                topology
                    .iter()
                    .filter(|node| ids.contains(node.id()))
                    .collect()
            }
        };

        if nodes.is_empty() {
            let projection = self
                .projection
                .as_ref()
                .map_or_else(|| "all".to_string(), ToString::to_string);
            return Err(MappingError::EmptyProjection(projection).into());
        }

        Ok(nodes)
    }
}

/// One active transaction as seen by its node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInfo {
    pub xid: String,
    pub label: Option<String>,
    /// Start time in milliseconds since the Unix epoch.
    pub start_time_ms: u64,
    pub duration: Duration,
    /// Number of operations (entries touched) so far.
    pub size: usize,
}

impl TxInfo {
    pub fn new(xid: impl Into<String>, duration: Duration, size: usize) -> Self {
        Self {
            xid: xid.into(),
            label: None,
            start_time_ms: 0,
            duration,
            size,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_start_time(mut self, start_time_ms: u64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }
}

/// Node-local resource listing the node's active transactions.
#[derive(Debug, Clone, Default)]
pub struct TxLog {
    active: Vec<TxInfo>,
}

impl TxLog {
    pub fn new(active: Vec<TxInfo>) -> Self {
        Self { active }
    }

    pub fn active(&self) -> &[TxInfo] {
        &self.active
    }
}

#[derive(Debug, Clone)]
struct TxFilter {
    min_duration: Option<Duration>,
    min_size: Option<usize>,
    label: Option<Regex>,
    limit: Option<usize>,
    order: TxSortOrder,
}

impl TxFilter {
    fn matches(&self, tx: &TxInfo) -> bool {
        if self.min_duration.is_some_and(|min| tx.duration < min) {
            return false;
        }
        if self.min_size.is_some_and(|min| tx.size < min) {
            return false;
        }
        match (&self.label, &tx.label) {
            (None, _) => true,
            (Some(re), Some(label)) => re.is_match(label),
            (Some(_), None) => false,
        }
    }

    fn apply(&self, active: &[TxInfo]) -> Vec<TxInfo> {
        let mut selected: Vec<TxInfo> = active
            .iter()
            .filter(|tx| self.matches(tx))
            .cloned()
            .collect();

        match self.order {
            TxSortOrder::Duration => selected.sort_by(|a, b| b.duration.cmp(&a.duration)),
            TxSortOrder::Size => selected.sort_by(|a, b| b.size.cmp(&a.size)),
            TxSortOrder::StartTime => selected.sort_by_key(|tx| tx.start_time_ms),
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Job listing the matching transactions of one node.
#[derive(Debug, Clone)]
pub struct TxJob {
    filter: TxFilter,
}

impl Job for TxJob {
    type Output = Vec<TxInfo>;

    fn execute(&self, ctx: &JobContext) -> std::result::Result<Vec<TxInfo>, JobFailure> {
        let log = ctx.resource::<TxLog>().ok_or_else(|| {
            JobFailure::msg(format!(
                "node '{}' exposes no transaction log",
                ctx.node().id()
            ))
        })?;

        let selected = self.filter.apply(log.active());
        debug!(
            node = %ctx.node().id(),
            active = log.active().len(),
            selected = selected.len(),
            "transactions filtered"
        );
        Ok(selected)
    }
}

/// Transactions reported by one node, or why it could not report.
#[derive(Debug)]
pub struct NodeTxs {
    pub node: NodeId,
    pub outcome: std::result::Result<Vec<TxInfo>, JobFailure>,
}

/// Per-node outcomes in arrival order.
#[derive(Debug, Default)]
pub struct TxTaskResult {
    nodes: Vec<NodeTxs>,
}

impl TxTaskResult {
    pub fn nodes(&self) -> &[NodeTxs] {
        &self.nodes
    }

    pub fn get(&self, node: &NodeId) -> Option<&NodeTxs> {
        self.nodes.iter().find(|entry| &entry.node == node)
    }

    pub fn total_transactions(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes
            .iter()
            .filter(|entry| entry.outcome.is_err())
            .map(|entry| &entry.node)
    }
}

/// Multi-node task listing active transactions across the projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxTask;

impl Task for TxTask {
    type Arg = TxTaskArg;
    type Job = TxJob;
    type Reduced = TxTaskResult;

    fn map(
        &self,
        topology: &TopologySnapshot,
        arg: &TxTaskArg,
    ) -> Result<JobAssignment<TxJob>> {
        arg.validate()?;

        let filter = TxFilter {
            min_duration: arg.min_duration,
            min_size: arg.min_size,
            label: arg.label_regex()?,
            limit: arg.limit,
            order: arg.order,
        };

        let mut assignment = JobAssignment::new();
        for node in arg.select_nodes(topology)? {
            assignment.assign(
                TxJob {
                    filter: filter.clone(),
                },
                node,
            );
        }
        Ok(assignment)
    }

    fn reduce(&self, results: ResultSet<Vec<TxInfo>>) -> Result<TxTaskResult> {
        let nodes = results
            .into_iter()
            .map(|res| NodeTxs {
                node: res.node().clone(),
                outcome: res.into_outcome(),
            })
            .collect();
        Ok(TxTaskResult { nodes })
    }
}

// src/task/assignment.rs

use std::fmt;
use std::sync::Arc;

use crate::topology::Node;
use crate::types::JobId;

/// One job bound to the node it must run on.
pub struct AssignedJob<J> {
    pub id: JobId,
    pub job: Arc<J>,
    pub node: Node,
}

impl<J> fmt::Debug for AssignedJob<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssignedJob")
            .field("id", &self.id)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Job → node mapping produced by `Task::map`.
///
/// Job IDs are allocated here, so every key is unique within one assignment.
/// The session consumes the assignment right after mapping.
pub struct JobAssignment<J> {
    entries: Vec<AssignedJob<J>>,
    next_id: u64,
}

impl<J> JobAssignment<J> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Assignment holding exactly one job.
    pub fn single(job: J, node: &Node) -> Self {
        let mut assignment = Self::new();
        assignment.assign(job, node);
        assignment
    }

    pub fn assign(&mut self, job: J, node: &Node) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.entries.push(AssignedJob {
            id,
            job: Arc::new(job),
            node: node.clone(),
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AssignedJob<J>> {
        self.entries.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.entries.iter().map(|entry| &entry.node)
    }

    pub(crate) fn into_entries(self) -> Vec<AssignedJob<J>> {
        self.entries
    }
}

impl<J> Default for JobAssignment<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J> fmt::Debug for JobAssignment<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

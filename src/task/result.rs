// src/task/result.rs

//! Per-job results and the arrival-ordered result set.

use crate::task::JobFailure;
use crate::topology::NodeId;
use crate::types::JobId;

/// Outcome of one job, tagged with the job and the node that ran it.
#[derive(Debug)]
pub struct JobResult<T> {
    job: JobId,
    node: NodeId,
    outcome: Result<T, JobFailure>,
}

impl<T> JobResult<T> {
    pub fn new(job: JobId, node: NodeId, outcome: Result<T, JobFailure>) -> Self {
        Self { job, node, outcome }
    }

    pub fn success(job: JobId, node: NodeId, payload: T) -> Self {
        Self::new(job, node, Ok(payload))
    }

    pub fn failure(job: JobId, node: NodeId, failure: JobFailure) -> Self {
        Self::new(job, node, Err(failure))
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    pub fn outcome(&self) -> &Result<T, JobFailure> {
        &self.outcome
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_err()
    }

    pub fn payload(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn failure_cause(&self) -> Option<&JobFailure> {
        self.outcome.as_ref().err()
    }

    pub fn into_outcome(self) -> Result<T, JobFailure> {
        self.outcome
    }
}

/// Job results in the order they arrived.
///
/// Tasks can rely on this order for their own tie-breaking.
#[derive(Debug)]
pub struct ResultSet<T> {
    results: Vec<JobResult<T>>,
}

impl<T> ResultSet<T> {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, result: JobResult<T>) {
        self.results.push(result);
    }

    pub(crate) fn pop(&mut self) -> Option<JobResult<T>> {
        self.results.pop()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobResult<T>> {
        self.results.iter()
    }

    pub fn first(&self) -> Option<&JobResult<T>> {
        self.results.first()
    }

    pub fn last(&self) -> Option<&JobResult<T>> {
        self.results.last()
    }

    pub fn successes(&self) -> usize {
        self.results.iter().filter(|res| !res.is_failure()).count()
    }

    pub fn failures(&self) -> usize {
        self.results.iter().filter(|res| res.is_failure()).count()
    }

    /// The only result, or `None` if the set holds zero or several.
    pub fn into_single(self) -> Option<JobResult<T>> {
        if self.results.len() != 1 {
            return None;
        }
        self.results.into_iter().next()
    }

    pub fn into_vec(self) -> Vec<JobResult<T>> {
        self.results
    }
}

impl<T> Default for ResultSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<JobResult<T>> for ResultSet<T> {
    fn from_iter<I: IntoIterator<Item = JobResult<T>>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for ResultSet<T> {
    type Item = JobResult<T>;
    type IntoIter = std::vec::IntoIter<JobResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a JobResult<T>;
    type IntoIter = std::slice::Iter<'a, JobResult<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

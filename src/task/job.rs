// src/task/job.rs

//! Job execution contract and the failure type carried in job results.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::topology::Node;

/// One node-targeted piece of a task's work.
///
/// The engine never looks inside a job; it only hands it to a transport,
/// which eventually calls `execute` on the assigned node.
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;

    fn execute(&self, ctx: &JobContext) -> Result<Self::Output, JobFailure>;
}

/// Failure raised by a job on its node.
///
/// Cloning shares the same underlying error, so a failure re-raised by
/// `reduce` is the very value the job produced (see [`JobFailure::ptr_eq`]).
#[derive(Clone)]
pub struct JobFailure(Arc<anyhow::Error>);

impl JobFailure {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        JobFailure(Arc::new(err.into()))
    }

    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        JobFailure(Arc::new(anyhow::Error::msg(message)))
    }

    /// The original error raised by the job.
    pub fn cause(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether both values carry the identical underlying error.
    pub fn ptr_eq(&self, other: &JobFailure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// What a job sees of the node it runs on.
///
/// Besides the node handle, a context carries typed node-local resources
/// (e.g. a transaction log) that transports attach per node.
#[derive(Clone)]
pub struct JobContext {
    node: Node,
    resources: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl JobContext {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            resources: Arc::new(HashMap::new()),
        }
    }

    pub fn with_resource<R: Any + Send + Sync>(mut self, resource: R) -> Self {
        Arc::make_mut(&mut self.resources).insert(TypeId::of::<R>(), Arc::new(resource));
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn resource<R: Any + Send + Sync>(&self) -> Option<&R> {
        self.resources
            .get(&TypeId::of::<R>())
            .and_then(|res| res.downcast_ref::<R>())
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("node", &self.node)
            .field("resources", &self.resources.len())
            .finish()
    }
}

// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::task::JobFailure;
use crate::topology::{NodeId, TopologySnapshot};
use crate::types::JobId;

/// Failures raised while turning a task into a job assignment.
///
/// These are fatal to the task and always surface before anything has been
/// dispatched.
#[derive(Error, Debug, Clone)]
pub enum MappingError {
    #[error("Target node to execute job not found in topology [id={id}, topology={topology}]")]
    NodeNotFound {
        id: NodeId,
        topology: TopologySnapshot,
    },

    #[error("Cannot map task onto an empty topology snapshot")]
    EmptyTopology,

    #[error("Task produced an empty job assignment")]
    EmptyAssignment,

    #[error("{job} assigned to node '{node}' which is not part of the topology snapshot")]
    NodeNotInTopology { job: JobId, node: NodeId },

    #[error("No node in the topology matches projection {0}")]
    EmptyProjection(String),
}

#[derive(Error, Debug)]
pub enum GridError {
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// A job failure re-raised by a task's reduce step, unchanged.
    #[error(transparent)]
    JobFailed(#[from] JobFailure),

    #[error("Reduce failed: {0}")]
    Reduce(anyhow::Error),

    #[error("Transport error: {0}")]
    Transport(anyhow::Error),

    #[error("Waiting for task result was cancelled")]
    Cancelled,

    #[error("Invalid task argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GridError {
    /// True for failures produced before any job was dispatched.
    pub fn is_mapping_failure(&self) -> bool {
        matches!(self, GridError::Mapping(_))
    }

    /// The carried job failure, if this error re-raises one.
    pub fn job_failure(&self) -> Option<&JobFailure> {
        match self {
            GridError::JobFailed(failure) => Some(failure),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, GridError>;

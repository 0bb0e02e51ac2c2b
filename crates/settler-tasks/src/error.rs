//! Error types for task construction, selection, and configuration.

use thiserror::Error;

use crate::agent::WorkerKind;

/// Errors raised by the scheduling layer.
///
/// None of these abort the colony tick loop: the engine logs the error for
/// the offending agent and moves on to the next one.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A fixed task duration must be positive and finite.
    #[error("invalid task duration {0}: must be positive and finite")]
    InvalidDuration(f64),

    /// Tasks are always owned by exactly one worker.
    #[error("task '{0}' was built without an owning worker")]
    MissingOwner(String),

    /// The descriptor has no implementation for this kind of worker.
    #[error("task '{task}' is not supported for {kind:?} workers")]
    Unsupported { task: String, kind: WorkerKind },

    /// No descriptor is registered under this ID.
    #[error("no task registered with id '{0}'")]
    UnknownTask(String),

    /// A shared settlement job was already claimed by another worker.
    #[error("settlement job '{0}' is no longer available")]
    JobUnavailable(String),

    /// The subtask chain is already as deep as allowed.
    #[error("subtask '{task}' would exceed the maximum depth of {max}")]
    SubTaskDepth { task: String, max: u32 },

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaskError>;

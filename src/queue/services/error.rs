//! Service-level errors for queue orchestration.

use super::ParamsError;
use crate::queue::{
    domain::{ParseQueuedStateError, QueueDomainError, TaskId},
    ports::TaskRepositoryError,
};
use thiserror::Error;

/// Errors surfaced by dispatch, scheduler passes and task administration.
///
/// Per-task execution failures never appear here; they are recorded on the
/// task's outcome instead.
#[derive(Debug, Error)]
pub enum QueueServiceError {
    /// Domain validation or a state transition failed.
    #[error(transparent)]
    Domain(#[from] QueueDomainError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// Command parameters were malformed.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// A requested state name is not recognised.
    #[error(transparent)]
    InvalidState(#[from] ParseQueuedStateError),

    /// No dispatch template is registered under the name.
    #[error("unknown dispatch template '{0}'")]
    UnknownTemplate(String),

    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The task is claimed by a scheduler pass and the change was not forced.
    #[error("task {0} is running; force the transition to override")]
    Claimed(TaskId),

    /// Another writer changed the task between read and write.
    #[error("task {0} was modified concurrently")]
    Conflict(TaskId),
}

/// Result type for queue services.
pub type QueueServiceResult<T> = Result<T, QueueServiceError>;

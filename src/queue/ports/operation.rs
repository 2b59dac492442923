//! Port contracts for the operations a task invokes when it runs.

use crate::queue::domain::{MethodName, ServiceName, TaskArguments, TaskId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type returned by task operations.
pub type OperationResult = Result<OperationOutput, OperationError>;

/// Input handed to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Task being executed.
    pub task_id: TaskId,
    /// Stored task arguments with scheduler parameters layered on top.
    pub arguments: TaskArguments,
}

/// Value reported by an operation that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutput {
    success: bool,
    message: Option<String>,
}

impl OperationOutput {
    /// The operation did its work.
    #[must_use]
    pub const fn succeeded() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// The operation ran but reported failure.
    #[must_use]
    pub const fn failed() -> Self {
        Self {
            success: false,
            message: None,
        }
    }

    /// Attaches a message recorded on the task.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns whether the operation reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the attached message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Consumes the output, returning the attached message.
    #[must_use]
    pub fn into_message(self) -> Option<String> {
        self.message
    }
}

impl From<bool> for OperationOutput {
    fn from(success: bool) -> Self {
        Self {
            success,
            message: None,
        }
    }
}

/// Error raised by an operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OperationError {
    message: String,
}

impl OperationError {
    /// Creates an operation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A named unit of work a task can run.
#[async_trait]
pub trait TaskOperation: Send + Sync {
    /// Runs the operation.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError`] when the work raised an error. Reporting
    /// failure without raising goes through [`OperationOutput::failed`].
    async fn invoke(&self, invocation: Invocation) -> OperationResult;
}

/// External service exposing operations by method name.
pub trait TaskService: Send + Sync {
    /// Returns the operation registered under `method`.
    fn operation(&self, method: &MethodName) -> Option<Arc<dyn TaskOperation>>;
}

/// Resolves operation handles by name.
pub trait OperationRegistry: Send + Sync {
    /// Returns the local operation registered under `method`.
    fn operation(&self, method: &MethodName) -> Option<Arc<dyn TaskOperation>>;

    /// Returns the service registered under `name`.
    fn service(&self, name: &ServiceName) -> Option<Arc<dyn TaskService>>;
}

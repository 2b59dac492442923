//! Port contracts for the task queue.
//!
//! Ports define infrastructure-agnostic interfaces used by queue services:
//! task persistence and resolution of the operations tasks invoke.

pub mod operation;
pub mod repository;

pub use operation::{
    Invocation, OperationError, OperationOutput, OperationRegistry, OperationResult,
    TaskOperation, TaskService,
};
pub use repository::{
    DateBound, TaskFilter, TaskQuery, TaskRepository, TaskRepositoryError, TaskRepositoryResult,
    date_of,
};

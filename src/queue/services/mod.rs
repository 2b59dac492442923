//! Application services for the task queue.
//!
//! - [`TaskDispatcher`] creates and enqueues tasks
//! - [`QueueRunner`] runs one scheduler pass through [`TaskSelector`] and
//!   [`TaskExecutor`]
//! - [`TaskArchiver`] removes halted tasks
//! - [`TaskLifecycleService`] handles administrative state changes

mod archiver;
mod dispatcher;
mod duplicate;
mod error;
mod execution;
mod lifecycle;
mod params;
mod runner;
mod selector;

pub use archiver::{ArchivePolicy, SweepSummary, TaskArchiver};
pub use dispatcher::{DispatchDefaults, DispatchRequest, TaskDispatcher};
pub use duplicate::DuplicateDetector;
pub use error::{QueueServiceError, QueueServiceResult};
pub use execution::{ExecutionReport, SkipReason, TaskExecutor, UnresolvedOperation};
pub use lifecycle::{TaskLifecycleService, TransitionTaskRequest};
pub use params::{Filter, GraceParam, HandlerParams, ParamsError, split_assignment};
pub use runner::{PassSummary, QueueRunner};
pub use selector::{DEFAULT_BATCH_SIZE, HandlerProfile, Selection, SelectionConfig, TaskSelector};

//! Taskqueue: a persisted task queue with a cooperative scheduler.
//!
//! Work is enqueued as task records carrying a method name and structured
//! arguments. A recurring scheduler pass selects eligible tasks, executes
//! them through a registry of named operations and records the outcome, so a
//! crash or restart cannot silently lose work. Execution is at-least-once.
//!
//! # Architecture
//!
//! Taskqueue follows hexagonal architecture principles:
//!
//! - **Domain**: the task state machine and selection vocabulary
//! - **Ports**: task storage and operation resolution traits
//! - **Adapters**: in-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`queue`]: task lifecycle, dispatch, scheduler passes and cleanup
//! - [`logging`]: tracing subscriber initialisation

pub mod logging;
pub mod queue;

//! In-memory adapter implementations.
//!
//! These adapters are thread-safe and need no database, so they back the
//! test suite and single-process deployments.

mod registry;
mod repository;

pub use registry::{FnOperation, InMemoryOperationRegistry, ServiceMethods, operation_fn};
pub use repository::InMemoryTaskRepository;

//! Domain model for the persisted task queue.
//!
//! The queue domain models the task state machine, the outcome of an
//! execution, the identity projection used for duplicate suppression, and
//! the relative periods and sort keys that drive selection. Infrastructure
//! concerns stay outside of the domain boundary.

mod arguments;
mod error;
mod identity;
mod ids;
mod ordering;
mod period;
mod state;
mod task;

pub use arguments::TaskArguments;
pub use error::{ParseOutcomeError, ParseQueuedStateError, QueueDomainError};
pub use identity::{IdentityField, IdentityFields, IdentityProjection, IdentityValue};
pub use ids::{MethodName, ModelRef, QueueName, ServiceName, TaskId, TaskTitle};
pub use ordering::{SortDirection, SortField, SortKey};
pub use period::{DateField, RelativePeriod};
pub use state::{Outcome, QueuedState};
pub use task::{PersistedTaskData, Task, TaskDraft, TaskTarget};

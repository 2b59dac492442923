//! Repository port for queued task persistence and selection.

use crate::queue::domain::{
    DateField, IdentityProjection, ModelRef, Outcome, QueueName, QueuedState, SortKey, Task,
    TaskId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Queued task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Allocates the identifier for a task about to be stored.
    ///
    /// Identifiers increase monotonically.
    async fn next_id(&self) -> TaskRepositoryResult<TaskId>;

    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists `task` only if the stored record is currently in one of the
    /// `expected` states.
    ///
    /// Returns `false` when another writer moved the task first. This is the
    /// atomic claim primitive; the check and the write happen as one step.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn compare_and_swap(
        &self,
        task: &Task,
        expected: &[QueuedState],
    ) -> TaskRepositoryResult<bool>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns tasks matching `query.filter`, sorted by `query.order` and
    /// truncated to `query.limit`.
    async fn find(&self, query: &TaskQuery) -> TaskRepositoryResult<Vec<Task>>;

    /// Counts tasks matching `filter`.
    async fn count(&self, filter: &TaskFilter) -> TaskRepositoryResult<u64>;

    /// Counts tasks outside a halt state whose identity fields equal the
    /// projection.
    async fn count_active_matching(
        &self,
        projection: &IdentityProjection,
    ) -> TaskRepositoryResult<u64>;

    /// Deletes a task.
    ///
    /// Returns whether a record was removed.
    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool>;
}

/// Conjunctive filter over stored tasks.
///
/// Unset members do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Exact task identifier.
    pub id: Option<TaskId>,
    /// Exact subject reference.
    pub model_ref: Option<ModelRef>,
    /// Exact queue name.
    pub queue_name: Option<QueueName>,
    /// Allowed states.
    pub states: Option<Vec<QueuedState>>,
    /// Allowed outcomes.
    pub outcomes: Option<Vec<Outcome>>,
    /// Upper bound on one of the date fields.
    pub date_bound: Option<DateBound>,
    /// Whether soft-archived tasks are included.
    pub include_archived: bool,
}

impl TaskFilter {
    /// Matches exactly one task by identifier.
    #[must_use]
    pub fn by_id(id: TaskId) -> Self {
        Self {
            id: Some(id),
            include_archived: true,
            ..Self::default()
        }
    }

    /// Matches every task about `model_ref`.
    #[must_use]
    pub fn by_model_ref(model_ref: ModelRef) -> Self {
        Self {
            model_ref: Some(model_ref),
            include_archived: true,
            ..Self::default()
        }
    }

    /// Evaluates the filter against a task.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.id.is_none_or(|id| task.id() == id)
            && self
                .model_ref
                .is_none_or(|model_ref| task.model_ref() == Some(model_ref))
            && self
                .queue_name
                .as_ref()
                .is_none_or(|queue_name| task.queue_name() == queue_name)
            && self
                .states
                .as_ref()
                .is_none_or(|states| states.contains(&task.state()))
            && self
                .outcomes
                .as_ref()
                .is_none_or(|outcomes| outcomes.contains(&task.outcome()))
            && self.date_bound.is_none_or(|bound| bound.admits(task))
            && (self.include_archived || !task.is_archived())
    }
}

/// Requires a date field to be set and not later than a cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    /// Compared field.
    pub field: DateField,
    /// Latest admitted value.
    pub not_after: DateTime<Utc>,
}

impl DateBound {
    /// Returns whether `task` satisfies the bound.
    #[must_use]
    pub fn admits(self, task: &Task) -> bool {
        date_of(task, self.field).is_some_and(|value| value <= self.not_after)
    }
}

/// Returns the value of `field` on `task`.
#[must_use]
pub fn date_of(task: &Task, field: DateField) -> Option<DateTime<Utc>> {
    match field {
        DateField::EventDate => Some(task.event_date()),
        DateField::QueuedDate => Some(task.queued_date()),
        DateField::StartDate => task.start_date(),
        DateField::EndDate => task.end_date(),
    }
}

/// Filtered, ordered and limited selection request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskQuery {
    /// Row filter.
    pub filter: TaskFilter,
    /// Sort clauses, most significant first.
    pub order: Vec<SortKey>,
    /// Maximum number of rows; `None` for all.
    pub limit: Option<usize>,
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A stored row could not be converted into a task.
    #[error("invalid persisted task {id}: {reason}")]
    InvalidPersistedData {
        /// Identifier of the offending row.
        id: TaskId,
        /// What failed to convert.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

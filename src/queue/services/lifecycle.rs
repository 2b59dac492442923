//! Administrative lookup and state changes of individual tasks.

use super::{QueueServiceError, QueueServiceResult};
use crate::queue::{
    domain::{QueuedState, Task, TaskId},
    ports::TaskRepository,
};
use mockable::Clock;
use std::sync::Arc;
use tracing::info;

/// Request payload for moving a task to another state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTaskRequest {
    task_id: TaskId,
    target_state: String,
    force: bool,
}

impl TransitionTaskRequest {
    /// Creates a non-forced transition request.
    #[must_use]
    pub fn new(task_id: TaskId, target_state: impl Into<String>) -> Self {
        Self {
            task_id,
            target_state: target_state.into(),
            force: false,
        }
    }

    /// Allows the transition to move a task out of
    /// [`QueuedState::Running`].
    #[must_use]
    pub const fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the requested state name.
    #[must_use]
    pub fn target_state(&self) -> &str {
        &self.target_state
    }

    /// Returns whether the request is forced.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.force
    }
}

/// Task administration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> TaskLifecycleService<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Repository`] when the lookup fails.
    pub async fn find_by_id(&self, task_id: TaskId) -> QueueServiceResult<Option<Task>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Moves a task to the requested state.
    ///
    /// The write only succeeds if the stored task is still in the state that
    /// was read.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::InvalidState`] for unknown state names,
    /// [`QueueServiceError::NotFound`] when the task does not exist,
    /// [`QueueServiceError::Claimed`] when a running task is moved without
    /// forcing, [`QueueServiceError::Domain`] for transitions outside the
    /// transition table, and [`QueueServiceError::Conflict`] when another
    /// writer changed the task first.
    pub async fn transition_task(
        &self,
        request: TransitionTaskRequest,
    ) -> QueueServiceResult<Task> {
        let target = QueuedState::try_from(request.target_state())?;
        let task_id = request.task_id();
        let mut task = self
            .repository
            .find_by_id(task_id)
            .await?
            .ok_or(QueueServiceError::NotFound(task_id))?;

        let current = task.state();
        if current.is_running() && !request.is_forced() {
            return Err(QueueServiceError::Claimed(task_id));
        }
        task.transition_to(target, &*self.clock)?;

        if !self.repository.compare_and_swap(&task, &[current]).await? {
            return Err(QueueServiceError::Conflict(task_id));
        }
        info!(task_id = %task_id, from = %current, to = %target, "transitioned task");
        Ok(task)
    }

    /// Cancels a task that is not running.
    ///
    /// # Errors
    ///
    /// See [`Self::transition_task`].
    pub async fn cancel(&self, task_id: TaskId) -> QueueServiceResult<Task> {
        self.transition_task(TransitionTaskRequest::new(
            task_id,
            QueuedState::Cancelled.as_str(),
        ))
        .await
    }
}

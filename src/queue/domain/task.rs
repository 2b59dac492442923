//! Queued task aggregate root.

use super::{
    MethodName, ModelRef, Outcome, QueueDomainError, QueueName, QueuedState, ServiceName,
    TaskArguments, TaskId, TaskTitle,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where a task's operation is resolved when it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskTarget {
    /// The operation is registered directly under the task's method name.
    #[default]
    Local,
    /// The operation is provided by a named external service.
    Service {
        /// Service that owns the method.
        service_name: ServiceName,
    },
}

impl TaskTarget {
    /// Returns the service name for service-delegating tasks.
    #[must_use]
    pub const fn service_name(&self) -> Option<&ServiceName> {
        match self {
            Self::Local => None,
            Self::Service { service_name } => Some(service_name),
        }
    }
}

/// Fields supplied when a new task is created.
///
/// Values are expected to be fully resolved; default merging happens in the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Task title.
    pub title: TaskTitle,
    /// Queue the task is placed on.
    pub queue_name: QueueName,
    /// Operation to invoke.
    pub method_name: MethodName,
    /// Where the operation is resolved.
    pub target: TaskTarget,
    /// Operation arguments.
    pub arguments: TaskArguments,
    /// Earliest run time; defaults to the creation time.
    pub event_date: Option<DateTime<Utc>>,
    /// External subject record.
    pub model_ref: Option<ModelRef>,
    /// Scheduling priority; lower values run first.
    pub priority: i32,
    /// Execution budget.
    pub timeout: Option<Duration>,
    /// Who enqueued the task.
    pub queued_by: Option<String>,
}

/// Queued task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: TaskTitle,
    queue_name: QueueName,
    state: QueuedState,
    outcome: Outcome,
    method_name: MethodName,
    target: TaskTarget,
    arguments: TaskArguments,
    event_date: DateTime<Utc>,
    queued_date: DateTime<Utc>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    archived_date: Option<DateTime<Utc>>,
    model_ref: Option<ModelRef>,
    priority: i32,
    timeout: Option<Duration>,
    queued_by: Option<String>,
    message: Option<String>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted title.
    pub title: TaskTitle,
    /// Persisted queue name.
    pub queue_name: QueueName,
    /// Persisted state.
    pub state: QueuedState,
    /// Persisted outcome.
    pub outcome: Outcome,
    /// Persisted method name.
    pub method_name: MethodName,
    /// Persisted resolution target.
    pub target: TaskTarget,
    /// Persisted arguments.
    pub arguments: TaskArguments,
    /// Persisted event date.
    pub event_date: DateTime<Utc>,
    /// Persisted queued date.
    pub queued_date: DateTime<Utc>,
    /// Persisted start date.
    pub start_date: Option<DateTime<Utc>>,
    /// Persisted end date.
    pub end_date: Option<DateTime<Utc>>,
    /// Persisted archival date.
    pub archived_date: Option<DateTime<Utc>>,
    /// Persisted subject reference.
    pub model_ref: Option<ModelRef>,
    /// Persisted priority.
    pub priority: i32,
    /// Persisted execution budget.
    pub timeout: Option<Duration>,
    /// Persisted enqueuer.
    pub queued_by: Option<String>,
    /// Persisted result message.
    pub message: Option<String>,
}

impl Task {
    /// Creates a task in [`QueuedState::Initialising`] with outcome
    /// [`Outcome::NotDetermined`].
    #[must_use]
    pub fn new(id: TaskId, draft: TaskDraft, clock: &impl Clock) -> Self {
        let now = clock.utc();
        Self {
            id,
            title: draft.title,
            queue_name: draft.queue_name,
            state: QueuedState::Initialising,
            outcome: Outcome::NotDetermined,
            method_name: draft.method_name,
            target: draft.target,
            arguments: draft.arguments,
            event_date: draft.event_date.unwrap_or(now),
            queued_date: now,
            start_date: None,
            end_date: None,
            archived_date: None,
            model_ref: draft.model_ref,
            priority: draft.priority,
            timeout: draft.timeout,
            queued_by: draft.queued_by,
            message: None,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            title: data.title,
            queue_name: data.queue_name,
            state: data.state,
            outcome: data.outcome,
            method_name: data.method_name,
            target: data.target,
            arguments: data.arguments,
            event_date: data.event_date,
            queued_date: data.queued_date,
            start_date: data.start_date,
            end_date: data.end_date,
            archived_date: data.archived_date,
            model_ref: data.model_ref,
            priority: data.priority,
            timeout: data.timeout,
            queued_by: data.queued_by,
            message: data.message,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the queue name.
    #[must_use]
    pub const fn queue_name(&self) -> &QueueName {
        &self.queue_name
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> QueuedState {
        self.state
    }

    /// Returns the outcome.
    #[must_use]
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the operation name.
    #[must_use]
    pub const fn method_name(&self) -> &MethodName {
        &self.method_name
    }

    /// Returns where the operation is resolved.
    #[must_use]
    pub const fn target(&self) -> &TaskTarget {
        &self.target
    }

    /// Returns the service name for service-delegating tasks.
    #[must_use]
    pub const fn service_name(&self) -> Option<&ServiceName> {
        self.target.service_name()
    }

    /// Returns the operation arguments.
    #[must_use]
    pub const fn arguments(&self) -> &TaskArguments {
        &self.arguments
    }

    /// Returns the earliest run time.
    #[must_use]
    pub const fn event_date(&self) -> DateTime<Utc> {
        self.event_date
    }

    /// Returns when the task was last queued.
    #[must_use]
    pub const fn queued_date(&self) -> DateTime<Utc> {
        self.queued_date
    }

    /// Returns when the task was last claimed.
    #[must_use]
    pub const fn start_date(&self) -> Option<DateTime<Utc>> {
        self.start_date
    }

    /// Returns when the task reached its halt state.
    #[must_use]
    pub const fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// Returns when the task was soft-archived.
    #[must_use]
    pub const fn archived_date(&self) -> Option<DateTime<Utc>> {
        self.archived_date
    }

    /// Returns the external subject reference.
    #[must_use]
    pub const fn model_ref(&self) -> Option<ModelRef> {
        self.model_ref
    }

    /// Returns the scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the execution budget.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns who enqueued the task.
    #[must_use]
    pub fn queued_by(&self) -> Option<&str> {
        self.queued_by.as_deref()
    }

    /// Returns the result message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns whether the task is in a ready state.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Returns whether the task is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Returns whether the task is in a halt state.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.state.is_halt()
    }

    /// Returns whether the task has been soft-archived.
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.archived_date.is_some()
    }

    /// Returns whether a scheduler pass may claim this task.
    #[must_use]
    pub const fn can_run(&self) -> bool {
        self.is_ready() && !self.is_running() && !self.is_complete()
    }

    /// Returns whether the archiver may remove this task without forcing.
    #[must_use]
    pub fn can_archive(&self, allow_archive_failed: bool) -> bool {
        self.is_complete() && (self.outcome != Outcome::Failed || allow_archive_failed)
    }

    /// Moves the task to `target`, applying the state's correlated side
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::IllegalTransition`] when the edge is not in
    /// the transition table. The task is left unchanged.
    pub fn transition_to(
        &mut self,
        target: QueuedState,
        clock: &impl Clock,
    ) -> Result<(), QueueDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(QueueDomainError::IllegalTransition {
                task_id: self.id,
                from: self.state,
                to: target,
            });
        }

        let now = clock.utc();
        match target {
            QueuedState::Queued => {
                self.outcome = Outcome::NotDetermined;
                self.queued_date = now;
                self.end_date = None;
            }
            QueuedState::Running => {
                self.outcome = Outcome::Determining;
                self.start_date = Some(now);
            }
            _ if target.is_halt() => self.end_date = Some(now),
            _ => {}
        }
        self.state = target;
        Ok(())
    }

    /// Claims the task for execution.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::IllegalTransition`] when the task is not in
    /// a state that may move to [`QueuedState::Running`].
    pub fn mark_running(&mut self, clock: &impl Clock) -> Result<(), QueueDomainError> {
        self.transition_to(QueuedState::Running, clock)
    }

    /// Records a finished execution and moves the task to
    /// [`QueuedState::Completed`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::NonTerminalOutcome`] for outcomes that do
    /// not describe a finished execution, or
    /// [`QueueDomainError::IllegalTransition`] when the task is not running.
    pub fn complete(
        &mut self,
        outcome: Outcome,
        message: Option<String>,
        clock: &impl Clock,
    ) -> Result<(), QueueDomainError> {
        if !outcome.is_terminal() {
            return Err(QueueDomainError::NonTerminalOutcome(outcome));
        }
        self.transition_to(QueuedState::Completed, clock)?;
        self.outcome = outcome;
        self.message = message;
        Ok(())
    }

    /// Stamps the task as soft-archived.
    pub fn mark_archived(&mut self, clock: &impl Clock) {
        self.archived_date = Some(clock.utc());
    }
}

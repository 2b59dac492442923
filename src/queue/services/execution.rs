//! Per-task execution protocol: claim, invoke, record the outcome.

use super::QueueServiceResult;
use crate::queue::{
    domain::{MethodName, Outcome, QueuedState, ServiceName, Task, TaskArguments, TaskId, TaskTarget},
    ports::{
        Invocation, OperationRegistry, OperationResult, TaskOperation, TaskRepository,
        TaskRepositoryError,
    },
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

/// Reasons an operation handle could not be found for a task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnresolvedOperation {
    /// No local operation has the task's method name.
    #[error("no operation registered for method '{0}'")]
    UnknownMethod(MethodName),

    /// The task delegates to a service that is not registered.
    #[error("no service registered under '{0}'")]
    UnknownService(ServiceName),

    /// The service exists but does not expose the method.
    #[error("service '{service}' has no method '{method}'")]
    ServiceMissingMethod {
        /// Service the task delegates to.
        service: ServiceName,
        /// Missing method.
        method: MethodName,
    },
}

/// Why a selected task was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The task was no longer runnable when its turn came.
    NotRunnable(QueuedState),
    /// Another pass claimed the task first.
    ClaimLost,
}

/// Result of handing one task to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    /// The task was left untouched.
    Skipped {
        /// Task identifier.
        task_id: TaskId,
        /// Why it was skipped.
        reason: SkipReason,
    },
    /// The task ran and is now [`QueuedState::Completed`].
    Completed {
        /// Task identifier.
        task_id: TaskId,
        /// Recorded outcome.
        outcome: Outcome,
    },
}

/// Claims and runs single tasks, containing every operation failure.
#[derive(Clone)]
pub struct TaskExecutor<R, O, C>
where
    R: TaskRepository,
    O: OperationRegistry,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    registry: Arc<O>,
    clock: Arc<C>,
    default_timeout: Option<Duration>,
}

impl<R, O, C> TaskExecutor<R, O, C>
where
    R: TaskRepository,
    O: OperationRegistry,
    C: Clock + Send + Sync,
{
    /// Creates an executor without a default timeout.
    #[must_use]
    pub const fn new(repository: Arc<R>, registry: Arc<O>, clock: Arc<C>) -> Self {
        Self {
            repository,
            registry,
            clock,
            default_timeout: None,
        }
    }

    /// Sets the budget for tasks that carry none of their own. A zero
    /// budget means no limit.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Executes `task`, layering `parameters` over its arguments.
    ///
    /// Operation errors, panics, timeouts and unresolved operations are
    /// recorded as an [`Outcome::Error`]; they never surface as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the claim or the
    /// outcome cannot be persisted. A task whose claim was persisted stays
    /// [`QueuedState::Running`] in that case.
    pub async fn execute(
        &self,
        mut task: Task,
        parameters: &TaskArguments,
    ) -> QueueServiceResult<ExecutionReport> {
        let task_id = task.id();
        if !task.can_run() {
            return Ok(ExecutionReport::Skipped {
                task_id,
                reason: SkipReason::NotRunnable(task.state()),
            });
        }

        task.mark_running(&*self.clock)?;
        let claimed = match self
            .repository
            .compare_and_swap(&task, &QueuedState::READY)
            .await
        {
            Ok(claimed) => claimed,
            Err(TaskRepositoryError::NotFound(_)) => false,
            Err(err) => return Err(err.into()),
        };
        if !claimed {
            warn!(task_id = %task_id, "task claimed by another pass, skipping");
            return Ok(ExecutionReport::Skipped {
                task_id,
                reason: SkipReason::ClaimLost,
            });
        }
        info!(task_id = %task_id, method = %task.method_name(), "claimed task");

        let (outcome, message) = self.invoke(&task, parameters).await;
        task.complete(outcome, message, &*self.clock)?;
        self.repository.update(&task).await?;

        Ok(ExecutionReport::Completed { task_id, outcome })
    }

    fn resolve(&self, task: &Task) -> Result<Arc<dyn TaskOperation>, UnresolvedOperation> {
        let method = task.method_name();
        match task.target() {
            TaskTarget::Local => self
                .registry
                .operation(method)
                .ok_or_else(|| UnresolvedOperation::UnknownMethod(method.clone())),
            TaskTarget::Service { service_name } => {
                let service = self
                    .registry
                    .service(service_name)
                    .ok_or_else(|| UnresolvedOperation::UnknownService(service_name.clone()))?;
                service
                    .operation(method)
                    .ok_or_else(|| UnresolvedOperation::ServiceMissingMethod {
                        service: service_name.clone(),
                        method: method.clone(),
                    })
            }
        }
    }

    /// The task's own budget wins over the default; a zero budget means no
    /// limit.
    fn budget_for(&self, task: &Task) -> Option<Duration> {
        task.timeout()
            .or(self.default_timeout)
            .filter(|budget| !budget.is_zero())
    }

    async fn invoke(&self, task: &Task, parameters: &TaskArguments) -> (Outcome, Option<String>) {
        let operation = match self.resolve(task) {
            Ok(operation) => operation,
            Err(err) => {
                warn!(task_id = %task.id(), error = %err, "operation could not be resolved");
                return (Outcome::Error, Some(err.to_string()));
            }
        };

        let invocation = Invocation {
            task_id: task.id(),
            arguments: task.arguments().merged_with(parameters),
        };
        let handle = tokio::spawn(async move { operation.invoke(invocation).await });

        let joined = match self.budget_for(task) {
            Some(budget) => {
                let abort = handle.abort_handle();
                if let Ok(joined) = tokio::time::timeout(budget, handle).await {
                    joined
                } else {
                    abort.abort();
                    warn!(task_id = %task.id(), ?budget, "operation timed out");
                    return (
                        Outcome::Error,
                        Some(format!("operation timed out after {budget:?}")),
                    );
                }
            }
            None => handle.await,
        };

        let (outcome, message) = interpret(joined);
        if outcome == Outcome::Error {
            warn!(task_id = %task.id(), message = ?message, "operation failed");
        }
        (outcome, message)
    }
}

fn interpret(joined: Result<OperationResult, JoinError>) -> (Outcome, Option<String>) {
    match joined {
        Ok(Ok(output)) if output.is_success() => (Outcome::Success, output.into_message()),
        Ok(Ok(output)) => (Outcome::Failed, output.into_message()),
        Ok(Err(err)) => (Outcome::Error, Some(err.message().to_owned())),
        Err(err) if err.is_panic() => (Outcome::Error, Some("operation panicked".to_owned())),
        Err(_) => (Outcome::Error, Some("operation was cancelled".to_owned())),
    }
}

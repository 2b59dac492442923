//! Task creation and enqueueing.

use super::{DuplicateDetector, QueueServiceError, QueueServiceResult};
use crate::queue::{
    domain::{
        IdentityFields, MethodName, ModelRef, QueueDomainError, QueueName, QueuedState,
        ServiceName, Task, TaskArguments, TaskDraft, TaskTarget, TaskTitle,
    },
    ports::TaskRepository,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Values used for dispatch request fields the caller leaves unset.
///
/// The dispatcher's own defaults sit below any named template, which sits
/// below the request itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchDefaults {
    /// Title.
    pub title: Option<String>,
    /// Queue name.
    pub queue_name: Option<String>,
    /// Operation name.
    pub method_name: Option<String>,
    /// Service name; set for service-delegating tasks.
    pub service_name: Option<String>,
    /// Scheduling priority.
    pub priority: Option<i32>,
    /// Execution budget in seconds.
    pub timeout_secs: Option<u64>,
    /// Base arguments; request arguments are layered on top.
    pub arguments: TaskArguments,
}

/// Caller-supplied fields of a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchRequest {
    title: Option<String>,
    queue_name: Option<String>,
    method_name: Option<String>,
    service_name: Option<String>,
    priority: Option<i32>,
    arguments: TaskArguments,
    event_date: Option<DateTime<Utc>>,
    model_ref: Option<ModelRef>,
    timeout: Option<Duration>,
    queued_by: Option<String>,
}

impl DispatchRequest {
    /// Creates a request with a title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets or replaces the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the queue name.
    #[must_use]
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_method_name(mut self, method_name: impl Into<String>) -> Self {
        self.method_name = Some(method_name.into());
        self
    }

    /// Makes the task delegate to a named service.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the operation arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: TaskArguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Delays the task until `event_date`.
    #[must_use]
    pub const fn with_event_date(mut self, event_date: DateTime<Utc>) -> Self {
        self.event_date = Some(event_date);
        self
    }

    /// Associates the task with a subject record.
    #[must_use]
    pub const fn with_model_ref(mut self, model_ref: ModelRef) -> Self {
        self.model_ref = Some(model_ref);
        self
    }

    /// Sets the execution budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Records who enqueued the task.
    #[must_use]
    pub fn with_queued_by(mut self, queued_by: impl Into<String>) -> Self {
        self.queued_by = Some(queued_by.into());
        self
    }
}

/// Creates tasks, suppresses duplicates and persists them.
///
/// The duplicate check and the insert are serialised per dispatcher (and its
/// clones), so concurrent callers sharing one dispatcher cannot both enqueue
/// the same identity.
#[derive(Clone)]
pub struct TaskDispatcher<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    detector: DuplicateDetector<R>,
    defaults: DispatchDefaults,
    templates: HashMap<String, DispatchDefaults>,
    gate: Arc<Mutex<()>>,
}

impl<R, C> TaskDispatcher<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        clock: Arc<C>,
        identity: IdentityFields,
        defaults: DispatchDefaults,
    ) -> Self {
        Self {
            detector: DuplicateDetector::new(Arc::clone(&repository), identity),
            repository,
            clock,
            defaults,
            templates: HashMap::new(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Registers a named template.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, template: DispatchDefaults) -> Self {
        self.templates.insert(name.into(), template);
        self
    }

    /// Dispatches a task using the dispatcher defaults.
    ///
    /// The returned task is [`QueuedState::Queued`], or
    /// [`QueuedState::Duplicate`] when an equivalent active task exists.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::Domain`] when the title, method, queue or
    /// service cannot be resolved to a valid value (nothing is persisted), or
    /// [`QueueServiceError::Repository`] when the store fails.
    pub async fn dispatch(&self, request: DispatchRequest) -> QueueServiceResult<Task> {
        let draft = resolve_draft(&self.defaults, None, request)?;
        self.enqueue(draft).await
    }

    /// Dispatches a task using the named template.
    ///
    /// # Errors
    ///
    /// Returns [`QueueServiceError::UnknownTemplate`] when no template has
    /// that name, plus the errors of [`Self::dispatch`].
    pub async fn dispatch_template(
        &self,
        name: &str,
        request: DispatchRequest,
    ) -> QueueServiceResult<Task> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| QueueServiceError::UnknownTemplate(name.to_owned()))?;
        let draft = resolve_draft(&self.defaults, Some(template), request)?;
        self.enqueue(draft).await
    }

    async fn enqueue(&self, draft: TaskDraft) -> QueueServiceResult<Task> {
        let _serialised = self.gate.lock().await;

        let id = self.repository.next_id().await?;
        let mut task = Task::new(id, draft, &*self.clock);
        let target = if self.detector.is_duplicate(&task).await? {
            QueuedState::Duplicate
        } else {
            QueuedState::Queued
        };
        task.transition_to(target, &*self.clock)?;
        self.repository.store(&task).await?;

        info!(
            task_id = %task.id(),
            title = %task.title(),
            queue = %task.queue_name(),
            state = %task.state(),
            "dispatched task"
        );
        Ok(task)
    }
}

fn layered<T>(
    requested: Option<T>,
    template: Option<&DispatchDefaults>,
    base: &DispatchDefaults,
    field: impl Fn(&DispatchDefaults) -> Option<T>,
) -> Option<T> {
    requested
        .or_else(|| template.and_then(&field))
        .or_else(|| field(base))
}

fn resolve_draft(
    base: &DispatchDefaults,
    template: Option<&DispatchDefaults>,
    request: DispatchRequest,
) -> Result<TaskDraft, QueueDomainError> {
    let title = TaskTitle::new(
        layered(request.title, template, base, |layer| layer.title.clone()).unwrap_or_default(),
    )?;
    let method_name = layered(request.method_name, template, base, |layer| {
        layer.method_name.clone()
    })
    .ok_or_else(|| QueueDomainError::MissingMethodName(title.to_string()))
    .and_then(MethodName::new)?;
    let target = layered(request.service_name, template, base, |layer| {
        layer.service_name.clone()
    })
    .map(ServiceName::new)
    .transpose()?
    .map_or(TaskTarget::Local, |service_name| TaskTarget::Service {
        service_name,
    });
    let queue_name = QueueName::new(
        layered(request.queue_name, template, base, |layer| {
            layer.queue_name.clone()
        })
        .unwrap_or_default(),
    )?;
    let priority =
        layered(request.priority, template, base, |layer| layer.priority).unwrap_or_default();
    let timeout = layered(request.timeout, template, base, |layer| {
        layer.timeout_secs.map(Duration::from_secs)
    });

    let mut arguments = base.arguments.clone();
    if let Some(layer) = template {
        arguments = arguments.merged_with(&layer.arguments);
    }

    Ok(TaskDraft {
        title,
        queue_name,
        method_name,
        target,
        arguments: arguments.merged_with(&request.arguments),
        event_date: request.event_date,
        model_ref: request.model_ref,
        priority,
        timeout,
        queued_by: request.queued_by,
    })
}

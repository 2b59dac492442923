//! Selection of the tasks a scheduler pass works on.

use super::{Filter, GraceParam, HandlerParams, QueueServiceResult};
use crate::queue::{
    domain::{
        DateField, ModelRef, Outcome, QueueDomainError, QueueName, QueuedState, RelativePeriod,
        SortField, SortKey, Task, TaskId,
    },
    ports::{DateBound, TaskFilter, TaskQuery, TaskRepository},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use tracing::debug;

/// Default number of tasks a pass handles.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Selection defaults of one kind of handler (runner or cleaner).
///
/// Parameters passed to a pass override these field by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerProfile {
    /// Queue to scan; the default (empty) queue name scans all queues.
    pub queue_name: QueueName,
    /// Admitted states.
    pub states: Filter<QueuedState>,
    /// Admitted outcomes.
    pub outcomes: Filter<Outcome>,
    /// Maximum number of tasks per pass.
    pub batch_size: usize,
    /// Secondary order applied after priority.
    pub processing_order: Vec<SortKey>,
    /// Grace period relative to the pass's reference time.
    pub grace_period: Option<RelativePeriod>,
    /// Date field compared against the grace period.
    pub grace_field: Option<DateField>,
}

impl HandlerProfile {
    /// Profile of the execution handler: ready tasks whose event date has
    /// arrived, oldest first.
    #[must_use]
    pub fn runner() -> Self {
        Self {
            queue_name: QueueName::default_queue(),
            states: Filter::OneOf(QueuedState::READY.to_vec()),
            outcomes: Filter::OneOf(Outcome::READY.to_vec()),
            batch_size: DEFAULT_BATCH_SIZE,
            processing_order: vec![SortKey::ascending(SortField::Id)],
            grace_period: Some(RelativePeriod::now()),
            grace_field: Some(DateField::EventDate),
        }
    }

    /// Profile of the cleanup handler: halted tasks of any outcome that
    /// ended more than five days ago.
    #[must_use]
    pub fn cleaner() -> Self {
        Self {
            queue_name: QueueName::default_queue(),
            states: Filter::OneOf(QueuedState::HALT.to_vec()),
            outcomes: Filter::Any,
            batch_size: 100,
            processing_order: vec![SortKey::ascending(SortField::Date(DateField::EndDate))],
            grace_period: RelativePeriod::parse("-5 days").ok(),
            grace_field: Some(DateField::EndDate),
        }
    }
}

impl Default for HandlerProfile {
    fn default() -> Self {
        Self::runner()
    }
}

/// Fully resolved selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    /// Queue to scan; empty for all.
    pub queue_name: QueueName,
    /// Admitted states.
    pub states: Filter<QueuedState>,
    /// Admitted outcomes.
    pub outcomes: Filter<Outcome>,
    /// Maximum number of tasks.
    pub batch_size: usize,
    /// Secondary order applied after priority.
    pub processing_order: Vec<SortKey>,
    /// Grace period; no date filter when `None`.
    pub grace_period: Option<RelativePeriod>,
    /// Date field compared against the grace period.
    pub grace_field: Option<DateField>,
    /// Selects exactly this task, ignoring every other filter.
    pub task_id: Option<TaskId>,
    /// Selects tasks about this subject, ignoring the other filters.
    pub model_ref: Option<ModelRef>,
    /// Reference time replacing the clock.
    pub reference_time: Option<DateTime<Utc>>,
}

impl SelectionConfig {
    /// Layers `params` over `profile`.
    #[must_use]
    pub fn from_params(profile: &HandlerProfile, params: &HandlerParams) -> Self {
        let grace_period = params
            .grace_period
            .clone()
            .map_or_else(|| profile.grace_period.clone(), GraceParam::into_period);
        Self {
            queue_name: params
                .queue_name
                .clone()
                .unwrap_or_else(|| profile.queue_name.clone()),
            states: params
                .states
                .clone()
                .unwrap_or_else(|| profile.states.clone()),
            outcomes: params
                .outcomes
                .clone()
                .unwrap_or_else(|| profile.outcomes.clone()),
            batch_size: params.batch_size.unwrap_or(profile.batch_size),
            processing_order: params
                .processing_order
                .clone()
                .unwrap_or_else(|| profile.processing_order.clone()),
            grace_period,
            grace_field: profile.grace_field,
            task_id: params.task_id,
            model_ref: params.model_ref,
            reference_time: params.run_date,
        }
    }

    /// Builds the repository query for this selection.
    ///
    /// `now` is used when no reference time is configured.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidPeriod`] when the grace period
    /// moves the reference time out of the representable range.
    pub fn to_query(&self, now: DateTime<Utc>) -> Result<TaskQuery, QueueDomainError> {
        if let Some(task_id) = self.task_id {
            return Ok(TaskQuery {
                filter: TaskFilter::by_id(task_id),
                order: Vec::new(),
                limit: Some(1),
            });
        }

        let order = self.order();
        if let Some(model_ref) = self.model_ref {
            return Ok(TaskQuery {
                filter: TaskFilter::by_model_ref(model_ref),
                order,
                limit: Some(self.batch_size),
            });
        }

        let date_bound = match (&self.grace_period, self.grace_field) {
            (Some(period), Some(field)) => {
                let reference = self.reference_time.unwrap_or(now);
                let not_after = period
                    .resolve(reference)
                    .ok_or_else(|| QueueDomainError::InvalidPeriod(period.to_string()))?;
                Some(DateBound { field, not_after })
            }
            _ => None,
        };

        Ok(TaskQuery {
            filter: TaskFilter {
                queue_name: (!self.queue_name.is_default()).then(|| self.queue_name.clone()),
                states: self.states.to_list(),
                outcomes: self.outcomes.to_list(),
                date_bound,
                ..TaskFilter::default()
            },
            order,
            limit: Some(self.batch_size),
        })
    }

    fn order(&self) -> Vec<SortKey> {
        std::iter::once(SortKey::priority())
            .chain(self.processing_order.iter().copied())
            .collect()
    }
}

/// Tasks chosen for one pass, in processing order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    tasks: Vec<Task>,
    matched: u64,
}

impl Selection {
    /// Returns the number of selected tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns whether nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Returns how many tasks matched before the batch limit was applied.
    #[must_use]
    pub const fn matched(&self) -> u64 {
        self.matched
    }

    /// Returns the selected tasks.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

impl IntoIterator for Selection {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_iter()
    }
}

/// Read-only query over the task store.
#[derive(Clone)]
pub struct TaskSelector<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
}

impl<R, C> TaskSelector<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates a selector.
    #[must_use]
    pub const fn new(repository: Arc<R>, clock: Arc<C>) -> Self {
        Self { repository, clock }
    }

    /// Selects the tasks described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Domain`] when the grace period
    /// cannot be resolved or [`super::QueueServiceError::Repository`] when
    /// the store fails.
    pub async fn select(&self, config: &SelectionConfig) -> QueueServiceResult<Selection> {
        let query = config.to_query(self.clock.utc())?;
        debug!(?query, "selecting tasks");
        let matched = self.repository.count(&query.filter).await?;
        let tasks = self.repository.find(&query).await?;
        Ok(Selection { tasks, matched })
    }
}

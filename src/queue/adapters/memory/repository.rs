//! In-memory repository for queued tasks.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::queue::{
    domain::{IdentityProjection, QueuedState, SortDirection, SortField, SortKey, Task, TaskId},
    ports::{TaskFilter, TaskQuery, TaskRepository, TaskRepositoryError, TaskRepositoryResult, date_of},
};

/// Thread-safe in-memory task repository.
///
/// Conditional updates are evaluated under the write lock, so concurrent
/// claims of the same task through clones of one repository have exactly one
/// winner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: BTreeMap<TaskId, Task>,
    last_id: i64,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

/// Compares two tasks by one sort clause.
///
/// Unset dates sort after set ones in ascending order, matching SQL's
/// default null ordering.
fn compare_by(left: &Task, right: &Task, key: SortKey) -> Ordering {
    let ordering = match key.field() {
        SortField::Id => left.id().cmp(&right.id()),
        SortField::Priority => left.priority().cmp(&right.priority()),
        SortField::Title => left.title().as_str().cmp(right.title().as_str()),
        SortField::QueueName => left.queue_name().as_str().cmp(right.queue_name().as_str()),
        SortField::Date(field) => match (date_of(left, field), date_of(right, field)) {
            (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    match key.direction() {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn compare_tasks(left: &Task, right: &Task, order: &[SortKey]) -> Ordering {
    order
        .iter()
        .map(|key| compare_by(left, right, *key))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| left.id().cmp(&right.id()))
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn next_id(&self) -> TaskRepositoryResult<TaskId> {
        let mut state = self.write()?;
        state.last_id += 1;
        Ok(TaskId::new(state.last_id))
    }

    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.last_id = state.last_id.max(task.id().value());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        *stored = task.clone();
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        task: &Task,
        expected: &[QueuedState],
    ) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if !expected.contains(&stored.state()) {
            return Ok(false);
        }
        *stored = task.clone();
        Ok(true)
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find(&self, query: &TaskQuery) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| query.filter.matches(task))
            .cloned()
            .collect();
        drop(state);

        tasks.sort_by(|left, right| compare_tasks(left, right, &query.order));
        if let Some(limit) = query.limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn count(&self, filter: &TaskFilter) -> TaskRepositoryResult<u64> {
        let state = self.read()?;
        let matched = state.tasks.values().filter(|task| filter.matches(task)).count();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn count_active_matching(
        &self,
        projection: &IdentityProjection,
    ) -> TaskRepositoryResult<u64> {
        let state = self.read()?;
        let matched = state
            .tasks
            .values()
            .filter(|task| !task.is_complete() && projection.matches(task))
            .count();
        Ok(u64::try_from(matched).unwrap_or(u64::MAX))
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        let mut state = self.write()?;
        Ok(state.tasks.remove(&id).is_some())
    }
}

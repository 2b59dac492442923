//! `PostgreSQL` repository implementation for queued tasks.

use super::{
    models::{NewTaskRow, NextIdRow, TaskChangeset, TaskRow},
    schema::queued_tasks,
};
use crate::queue::{
    domain::{
        DateField, IdentityField, IdentityProjection, IdentityValue, MethodName, ModelRef,
        Outcome, PersistedTaskData, QueueName, QueuedState, ServiceName, SortDirection,
        SortField, SortKey, Task, TaskArguments, TaskId, TaskTarget, TaskTitle,
    },
    ports::{TaskFilter, TaskQuery, TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::time::Duration;

/// `PostgreSQL` connection pool type used by the queue adapters.
pub type QueuePgPool = Pool<ConnectionManager<PgConnection>>;

type BoxedTaskQuery = queued_tasks::BoxedQuery<'static, Pg>;

/// `PostgreSQL`-backed task repository.
///
/// The claim primitive is a single `UPDATE ... WHERE state = ANY(...)`
/// statement, so it is atomic across scheduler processes.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: QueuePgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: QueuePgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn next_id(&self) -> TaskRepositoryResult<TaskId> {
        self.run_blocking(|connection| {
            let row = diesel::sql_query(
                "SELECT nextval(pg_get_serial_sequence('queued_tasks', 'id')) AS id",
            )
            .get_result::<NextIdRow>(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(TaskId::new(row.id))
        })
        .await
    }

    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let new_row = NewTaskRow {
            id: task_id.value(),
            columns: to_changeset(task)?,
        };

        self.run_blocking(move |connection| {
            diesel::insert_into(queued_tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;

        self.run_blocking(move |connection| {
            let updated = diesel::update(queued_tasks::table.find(task_id.value()))
                .set(&changeset)
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if updated == 0 {
                return Err(TaskRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        task: &Task,
        expected: &[QueuedState],
    ) -> TaskRepositoryResult<bool> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;
        let expected_states = state_strings(expected);

        self.run_blocking(move |connection| {
            let updated = diesel::update(
                queued_tasks::table
                    .filter(queued_tasks::id.eq(task_id.value()))
                    .filter(queued_tasks::state.eq_any(expected_states)),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if updated > 0 {
                return Ok(true);
            }

            let exists = diesel::select(diesel::dsl::exists(
                queued_tasks::table.filter(queued_tasks::id.eq(task_id.value())),
            ))
            .get_result::<bool>(connection)
            .map_err(TaskRepositoryError::persistence)?;
            if exists {
                Ok(false)
            } else {
                Err(TaskRepositoryError::NotFound(task_id))
            }
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = queued_tasks::table
                .find(id.value())
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find(&self, query: &TaskQuery) -> TaskRepositoryResult<Vec<Task>> {
        let filter = query.filter.clone();
        let order = query.order.clone();
        let limit = query
            .limit
            .map(i64::try_from)
            .transpose()
            .map_err(TaskRepositoryError::persistence)?;

        self.run_blocking(move |connection| {
            let mut statement = ordered(filtered(&filter), &order);
            if let Some(max_rows) = limit {
                statement = statement.limit(max_rows);
            }
            let rows = statement
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn count(&self, filter: &TaskFilter) -> TaskRepositoryResult<u64> {
        let owned_filter = filter.clone();
        self.run_blocking(move |connection| {
            let total = filtered(&owned_filter)
                .count()
                .get_result::<i64>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            u64::try_from(total).map_err(TaskRepositoryError::persistence)
        })
        .await
    }

    async fn count_active_matching(
        &self,
        projection: &IdentityProjection,
    ) -> TaskRepositoryResult<u64> {
        let owned_projection = projection.clone();
        self.run_blocking(move |connection| {
            let mut statement = queued_tasks::table
                .into_boxed()
                .filter(queued_tasks::state.ne_all(state_strings(&QueuedState::HALT)));
            for (field, value) in owned_projection.values() {
                statement = filter_identity(statement, *field, value);
            }
            let total = statement
                .count()
                .get_result::<i64>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            u64::try_from(total).map_err(TaskRepositoryError::persistence)
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(queued_tasks::table.find(id.value()))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn state_strings(states: &[QueuedState]) -> Vec<String> {
    states.iter().map(|state| state.as_str().to_owned()).collect()
}

fn filtered(filter: &TaskFilter) -> BoxedTaskQuery {
    let mut statement = queued_tasks::table.into_boxed();
    if let Some(id) = filter.id {
        statement = statement.filter(queued_tasks::id.eq(id.value()));
    }
    if let Some(model_ref) = filter.model_ref {
        statement = statement.filter(queued_tasks::model_ref.eq(model_ref.value()));
    }
    if let Some(queue_name) = &filter.queue_name {
        statement = statement.filter(queued_tasks::queue_name.eq(queue_name.as_str().to_owned()));
    }
    if let Some(states) = &filter.states {
        statement = statement.filter(queued_tasks::state.eq_any(state_strings(states)));
    }
    if let Some(outcomes) = &filter.outcomes {
        let values: Vec<String> = outcomes
            .iter()
            .map(|outcome| outcome.as_str().to_owned())
            .collect();
        statement = statement.filter(queued_tasks::outcome.eq_any(values));
    }
    if let Some(bound) = filter.date_bound {
        let cutoff = bound.not_after;
        statement = match bound.field {
            DateField::EventDate => statement.filter(queued_tasks::event_date.le(cutoff)),
            DateField::QueuedDate => statement.filter(queued_tasks::queued_date.le(cutoff)),
            DateField::StartDate => statement.filter(queued_tasks::start_date.le(cutoff)),
            DateField::EndDate => statement.filter(queued_tasks::end_date.le(cutoff)),
        };
    }
    if !filter.include_archived {
        statement = statement.filter(queued_tasks::archived_date.is_null());
    }
    statement
}

fn ordered(mut statement: BoxedTaskQuery, order: &[SortKey]) -> BoxedTaskQuery {
    for key in order {
        let descending = key.direction() == SortDirection::Descending;
        statement = match (key.field(), descending) {
            (SortField::Id, false) => statement.then_order_by(queued_tasks::id.asc()),
            (SortField::Id, true) => statement.then_order_by(queued_tasks::id.desc()),
            (SortField::Priority, false) => statement.then_order_by(queued_tasks::priority.asc()),
            (SortField::Priority, true) => statement.then_order_by(queued_tasks::priority.desc()),
            (SortField::Title, false) => statement.then_order_by(queued_tasks::title.asc()),
            (SortField::Title, true) => statement.then_order_by(queued_tasks::title.desc()),
            (SortField::QueueName, false) => {
                statement.then_order_by(queued_tasks::queue_name.asc())
            }
            (SortField::QueueName, true) => {
                statement.then_order_by(queued_tasks::queue_name.desc())
            }
            (SortField::Date(field), _) => order_by_date(statement, field, descending),
        };
    }
    statement.then_order_by(queued_tasks::id.asc())
}

fn order_by_date(statement: BoxedTaskQuery, field: DateField, descending: bool) -> BoxedTaskQuery {
    match (field, descending) {
        (DateField::EventDate, false) => statement.then_order_by(queued_tasks::event_date.asc()),
        (DateField::EventDate, true) => statement.then_order_by(queued_tasks::event_date.desc()),
        (DateField::QueuedDate, false) => statement.then_order_by(queued_tasks::queued_date.asc()),
        (DateField::QueuedDate, true) => statement.then_order_by(queued_tasks::queued_date.desc()),
        (DateField::StartDate, false) => statement.then_order_by(queued_tasks::start_date.asc()),
        (DateField::StartDate, true) => statement.then_order_by(queued_tasks::start_date.desc()),
        (DateField::EndDate, false) => statement.then_order_by(queued_tasks::end_date.asc()),
        (DateField::EndDate, true) => statement.then_order_by(queued_tasks::end_date.desc()),
    }
}

fn filter_identity(
    statement: BoxedTaskQuery,
    field: IdentityField,
    value: &IdentityValue,
) -> BoxedTaskQuery {
    match (field, value) {
        (IdentityField::Title, IdentityValue::Text(Some(text))) => {
            statement.filter(queued_tasks::title.eq(text.clone()))
        }
        (IdentityField::QueueName, IdentityValue::Text(Some(text))) => {
            statement.filter(queued_tasks::queue_name.eq(text.clone()))
        }
        (IdentityField::MethodName, IdentityValue::Text(Some(text))) => {
            statement.filter(queued_tasks::method_name.eq(text.clone()))
        }
        (IdentityField::ServiceName, IdentityValue::Text(Some(text))) => {
            statement.filter(queued_tasks::service_name.eq(text.clone()))
        }
        (IdentityField::ServiceName, IdentityValue::Text(None)) => {
            statement.filter(queued_tasks::service_name.is_null())
        }
        (IdentityField::ModelRef, IdentityValue::Model(Some(model_ref))) => {
            statement.filter(queued_tasks::model_ref.eq(model_ref.value()))
        }
        (IdentityField::ModelRef, IdentityValue::Model(None)) => {
            statement.filter(queued_tasks::model_ref.is_null())
        }
        // Title, queue and method are never absent on a stored task.
        _ => statement.filter(diesel::dsl::sql::<diesel::sql_types::Bool>("FALSE")),
    }
}

fn to_changeset(task: &Task) -> TaskRepositoryResult<TaskChangeset> {
    let timeout_secs = task
        .timeout()
        .map(|timeout| i64::try_from(timeout.as_secs()))
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;

    Ok(TaskChangeset {
        title: task.title().as_str().to_owned(),
        queue_name: task.queue_name().as_str().to_owned(),
        state: task.state().as_str().to_owned(),
        outcome: task.outcome().as_str().to_owned(),
        method_name: task.method_name().as_str().to_owned(),
        service_name: task.service_name().map(|name| name.as_str().to_owned()),
        arguments: task.arguments().to_value(),
        event_date: task.event_date(),
        queued_date: task.queued_date(),
        start_date: task.start_date(),
        end_date: task.end_date(),
        archived_date: task.archived_date(),
        model_ref: task.model_ref().map(ModelRef::value),
        priority: task.priority(),
        timeout_secs,
        queued_by: task.queued_by().map(str::to_owned),
        message: task.message().map(str::to_owned),
    })
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let id = TaskId::new(row.id);
    let invalid = |reason: String| TaskRepositoryError::InvalidPersistedData { id, reason };

    let state = QueuedState::try_from(row.state.as_str()).map_err(|err| invalid(err.to_string()))?;
    let outcome = Outcome::try_from(row.outcome.as_str()).map_err(|err| invalid(err.to_string()))?;
    let title = TaskTitle::new(row.title).map_err(|err| invalid(err.to_string()))?;
    let queue_name = QueueName::new(row.queue_name).map_err(|err| invalid(err.to_string()))?;
    let method_name = MethodName::new(row.method_name).map_err(|err| invalid(err.to_string()))?;
    let target = row
        .service_name
        .map(ServiceName::new)
        .transpose()
        .map_err(|err| invalid(err.to_string()))?
        .map_or(TaskTarget::Local, |service_name| TaskTarget::Service {
            service_name,
        });
    let arguments =
        TaskArguments::from_value(row.arguments).map_err(|err| invalid(err.to_string()))?;
    let timeout = row
        .timeout_secs
        .map(u64::try_from)
        .transpose()
        .map_err(|err| invalid(err.to_string()))?
        .map(Duration::from_secs);

    Ok(Task::from_persisted(PersistedTaskData {
        id,
        title,
        queue_name,
        state,
        outcome,
        method_name,
        target,
        arguments,
        event_date: row.event_date,
        queued_date: row.queued_date,
        start_date: row.start_date,
        end_date: row.end_date,
        archived_date: row.archived_date,
        model_ref: row.model_ref.map(ModelRef::new),
        priority: row.priority,
        timeout,
        queued_by: row.queued_by,
        message: row.message,
    }))
}

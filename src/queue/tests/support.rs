//! Task builders shared by the unit tests.

use crate::queue::domain::{
    MethodName, Outcome, PersistedTaskData, QueueName, QueuedState, Task, TaskArguments,
    TaskDraft, TaskId, TaskTarget, TaskTitle,
};
use chrono::{DateTime, Utc};

/// Returns a draft for a local `noop` task on the default queue.
pub fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: TaskTitle::new(title).expect("valid test title"),
        queue_name: QueueName::default_queue(),
        method_name: MethodName::new("noop").expect("valid test method"),
        target: TaskTarget::Local,
        arguments: TaskArguments::new(),
        event_date: None,
        model_ref: None,
        priority: 0,
        timeout: None,
        queued_by: None,
    }
}

/// Returns persisted data for a task in `state` with consistent dates.
pub fn persisted(id: i64, state: QueuedState, at: DateTime<Utc>) -> PersistedTaskData {
    let outcome = match state {
        QueuedState::Running => Outcome::Determining,
        QueuedState::Completed => Outcome::Success,
        _ => Outcome::NotDetermined,
    };
    PersistedTaskData {
        id: TaskId::new(id),
        title: TaskTitle::new(format!("task {id}")).expect("valid test title"),
        queue_name: QueueName::default_queue(),
        state,
        outcome,
        method_name: MethodName::new("noop").expect("valid test method"),
        target: TaskTarget::Local,
        arguments: TaskArguments::new(),
        event_date: at,
        queued_date: at,
        start_date: (state.is_running() || state == QueuedState::Completed).then_some(at),
        end_date: state.is_halt().then_some(at),
        archived_date: None,
        model_ref: None,
        priority: 0,
        timeout: None,
        queued_by: None,
        message: None,
    }
}

/// Returns a task in `state`.
pub fn task_in(id: i64, state: QueuedState) -> Task {
    Task::from_persisted(persisted(id, state, Utc::now()))
}

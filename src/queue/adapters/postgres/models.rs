//! Diesel row models for queued task persistence.

use super::schema::queued_tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for queued task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = queued_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub queue_name: String,
    pub state: String,
    pub outcome: String,
    pub method_name: String,
    pub service_name: Option<String>,
    pub arguments: Value,
    pub event_date: DateTime<Utc>,
    pub queued_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub archived_date: Option<DateTime<Utc>>,
    pub model_ref: Option<i64>,
    pub priority: i32,
    pub timeout_secs: Option<i64>,
    pub queued_by: Option<String>,
    pub message: Option<String>,
}

/// Mutable columns, written on insert and on every update.
///
/// `None` clears the column.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = queued_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct TaskChangeset {
    pub title: String,
    pub queue_name: String,
    pub state: String,
    pub outcome: String,
    pub method_name: String,
    pub service_name: Option<String>,
    pub arguments: Value,
    pub event_date: DateTime<Utc>,
    pub queued_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub archived_date: Option<DateTime<Utc>>,
    pub model_ref: Option<i64>,
    pub priority: i32,
    pub timeout_secs: Option<i64>,
    pub queued_by: Option<String>,
    pub message: Option<String>,
}

/// Insert model for queued task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = queued_tasks)]
pub struct NewTaskRow {
    pub id: i64,
    #[diesel(embed)]
    pub columns: TaskChangeset,
}

/// Result of allocating the next task identifier.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct NextIdRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub id: i64,
}

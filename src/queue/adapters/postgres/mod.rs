//! `PostgreSQL` adapters for queued task persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTaskRepository, QueuePgPool};

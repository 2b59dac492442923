//! Error types for queue domain validation and parsing.

use super::{Outcome, QueuedState, TaskId};
use thiserror::Error;

/// Errors returned while constructing or mutating queue domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueDomainError {
    /// The requested state change is not present in the transition table.
    #[error("illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current state.
        from: QueuedState,
        /// Requested target state.
        to: QueuedState,
    },

    /// Completing a task requires a terminal outcome.
    #[error("outcome '{0}' cannot complete a task")]
    NonTerminalOutcome(Outcome),

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task title exceeds the storage limit.
    #[error("task title exceeds {limit} character limit")]
    TitleTooLong {
        /// Maximum number of characters.
        limit: usize,
    },

    /// No method name could be resolved from the request or its defaults.
    #[error("no method name resolvable for task '{0}'")]
    MissingMethodName(String),

    /// A queue, method or service name failed validation.
    #[error("invalid {kind} name '{value}'")]
    InvalidName {
        /// Which kind of name was rejected.
        kind: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A relative period expression could not be parsed.
    #[error("invalid relative period '{0}', expected e.g. 'now', '-2 days' or '+1 hour'")]
    InvalidPeriod(String),

    /// A sort expression could not be parsed.
    #[error("invalid sort expression '{0}', expected '<field> [asc|desc]'")]
    InvalidSortKey(String),

    /// A date field name is not recognised.
    #[error("unknown date field '{0}'")]
    UnknownDateField(String),

    /// An identity field name is not recognised.
    #[error("unknown identity field '{0}'")]
    UnknownIdentityField(String),

    /// Task arguments must be a JSON object.
    #[error("task arguments must be a JSON object")]
    ArgumentsNotAnObject,
}

impl QueueDomainError {
    /// Returns whether this error rejects caller input rather than a state
    /// change.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(
            self,
            Self::IllegalTransition { .. } | Self::NonTerminalOutcome(_)
        )
    }
}

/// Error returned while parsing task states from persistence or parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown queued state: {0}")]
pub struct ParseQueuedStateError(pub String);

/// Error returned while parsing outcomes from persistence or parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown outcome: {0}")]
pub struct ParseOutcomeError(pub String);

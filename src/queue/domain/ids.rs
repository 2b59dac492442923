//! Identifier and validated scalar types for the queue domain.

use super::QueueDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a queued task.
///
/// Identifiers are allocated from a monotonically increasing sequence, so
/// ordering by identifier is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i64);

impl TaskId {
    /// Creates a task identifier from a stored value.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the stored value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the external subject record a task refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelRef(i64);

impl ModelRef {
    /// Creates a subject reference from its foreign key.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the foreign key.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable task label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskTitle(String);

impl TaskTitle {
    /// Longest title the storage schema accepts.
    pub const MAX_LENGTH: usize = 255;

    /// Creates a validated title.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::EmptyTitle`] when the value is blank or
    /// [`QueueDomainError::TitleTooLong`] when it exceeds
    /// [`Self::MAX_LENGTH`] characters.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QueueDomainError::EmptyTitle);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(QueueDomainError::TitleTooLong {
                limit: Self::MAX_LENGTH,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the title as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical partition a task belongs to.
///
/// The empty name is the default queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    /// Creates a validated queue name.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidName`] when the name contains
    /// characters outside `[A-Za-z0-9_.:-]` or exceeds 100 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        validated_name("queue", value.into(), true).map(Self)
    }

    /// Returns the default (unnamed) queue.
    #[must_use]
    pub const fn default_queue() -> Self {
        Self(String::new())
    }

    /// Returns whether this is the default queue.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the queue name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of the operation invoked when a task runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodName(String);

impl MethodName {
    /// Creates a validated method name.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidName`] when the name is empty,
    /// contains characters outside `[A-Za-z0-9_.:-]` or exceeds 100
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        validated_name("method", value.into(), false).map(Self)
    }

    /// Returns the method name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an external service a delegating task runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a validated service name.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidName`] when the name is empty,
    /// contains characters outside `[A-Za-z0-9_.:-]` or exceeds 100
    /// characters.
    pub fn new(value: impl Into<String>) -> Result<Self, QueueDomainError> {
        validated_name("service", value.into(), false).map(Self)
    }

    /// Returns the service name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const MAX_NAME_LENGTH: usize = 100;

fn validated_name(
    kind: &'static str,
    raw: String,
    allow_empty: bool,
) -> Result<String, QueueDomainError> {
    let trimmed = raw.trim();
    let valid_chars = trimmed
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '-'));
    let valid_length = trimmed.len() <= MAX_NAME_LENGTH && (allow_empty || !trimmed.is_empty());

    if !valid_chars || !valid_length {
        return Err(QueueDomainError::InvalidName { kind, value: raw });
    }
    Ok(trimmed.to_owned())
}

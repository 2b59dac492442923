//! Processing order of queued tasks.

use super::{DateField, QueueDomainError, state::normalize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task field a selection can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Store-assigned identifier (creation order).
    Id,
    /// Scheduling priority; lower values first.
    Priority,
    /// Task title.
    Title,
    /// Queue name.
    QueueName,
    /// One of the task date fields.
    Date(DateField),
}

impl SortField {
    /// Returns the canonical storage column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Priority => "priority",
            Self::Title => "title",
            Self::QueueName => "queue_name",
            Self::Date(field) => field.as_str(),
        }
    }
}

impl TryFrom<&str> for SortField {
    type Error = QueueDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match normalize(value).as_str() {
            "id" => Ok(Self::Id),
            "priority" | "queuepriority" => Ok(Self::Priority),
            "title" => Ok(Self::Title),
            "queuename" => Ok(Self::QueueName),
            _ => DateField::try_from(value)
                .map(Self::Date)
                .map_err(|_| QueueDomainError::InvalidSortKey(value.to_owned())),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Returns the SQL keyword for this direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// One `(field, direction)` clause of a processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortKey {
    field: SortField,
    direction: SortDirection,
}

impl SortKey {
    /// Creates an ascending sort clause.
    #[must_use]
    pub const fn ascending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    /// Creates a descending sort clause.
    #[must_use]
    pub const fn descending(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }

    /// The clause every selection starts with: priority ascending.
    #[must_use]
    pub const fn priority() -> Self {
        Self::ascending(SortField::Priority)
    }

    /// Returns the sorted field.
    #[must_use]
    pub const fn field(self) -> SortField {
        self.field
    }

    /// Returns the sort direction.
    #[must_use]
    pub const fn direction(self) -> SortDirection {
        self.direction
    }

    /// Parses `field [asc|desc]`, e.g. `QueuedDate DESC` or `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidSortKey`] when the field is unknown
    /// or the direction is not `asc`/`desc`.
    pub fn parse(clause: &str) -> Result<Self, QueueDomainError> {
        let invalid = || QueueDomainError::InvalidSortKey(clause.to_owned());
        let mut words = clause.split_whitespace();
        let field_name = words.next().ok_or_else(invalid)?;
        let field = SortField::try_from(field_name).map_err(|_| invalid())?;
        let direction = match words.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc" | "ascending") => SortDirection::Ascending,
            Some("desc" | "descending") => SortDirection::Descending,
            Some(_) => return Err(invalid()),
        };
        if words.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { field, direction })
    }

    /// Parses a comma-separated list of clauses, e.g. `priority, id desc`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidSortKey`] for the first clause that
    /// fails to parse.
    pub fn parse_list(clauses: &str) -> Result<Vec<Self>, QueueDomainError> {
        clauses
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(Self::parse)
            .collect()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.direction.as_str())
    }
}

impl TryFrom<String> for SortKey {
    type Error = QueueDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SortKey> for String {
    fn from(value: SortKey) -> Self {
        value.to_string()
    }
}

//! Identity projection used for duplicate suppression.

use super::{ModelRef, QueueDomainError, Task, state::normalize};
use serde::{Deserialize, Serialize};

/// Task field that participates in duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    /// Task title.
    Title,
    /// Queue name.
    QueueName,
    /// Operation name.
    MethodName,
    /// Delegated service name (absent for local tasks).
    ServiceName,
    /// External subject record, compared by foreign key.
    ModelRef,
}

impl IdentityField {
    /// Returns the canonical storage column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::QueueName => "queue_name",
            Self::MethodName => "method_name",
            Self::ServiceName => "service_name",
            Self::ModelRef => "model_ref",
        }
    }
}

impl TryFrom<&str> for IdentityField {
    type Error = QueueDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match normalize(value).as_str() {
            "title" => Ok(Self::Title),
            "queuename" => Ok(Self::QueueName),
            "methodname" => Ok(Self::MethodName),
            "servicename" => Ok(Self::ServiceName),
            "modelref" | "model" => Ok(Self::ModelRef),
            _ => Err(QueueDomainError::UnknownIdentityField(value.to_owned())),
        }
    }
}

/// Ordered, de-duplicated set of identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<IdentityField>", into = "Vec<IdentityField>")]
pub struct IdentityFields(Vec<IdentityField>);

impl IdentityFields {
    /// Creates a field set, dropping repeated fields.
    #[must_use]
    pub fn new(fields: impl IntoIterator<Item = IdentityField>) -> Self {
        let mut unique = Vec::new();
        for field in fields {
            if !unique.contains(&field) {
                unique.push(field);
            }
        }
        Self(unique)
    }

    /// The empty set: no task is ever a duplicate.
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    /// Returns the fields in configuration order.
    #[must_use]
    pub fn fields(&self) -> &[IdentityField] {
        &self.0
    }

    /// Returns whether duplicate detection is disabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for IdentityFields {
    fn default() -> Self {
        Self(vec![IdentityField::Title, IdentityField::MethodName])
    }
}

impl From<Vec<IdentityField>> for IdentityFields {
    fn from(value: Vec<IdentityField>) -> Self {
        Self::new(value)
    }
}

impl From<IdentityFields> for Vec<IdentityField> {
    fn from(value: IdentityFields) -> Self {
        value.0
    }
}

/// Value of one identity field on a concrete task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityValue {
    /// A text field; `None` when the task does not carry it.
    Text(Option<String>),
    /// A subject reference; `None` when the task has no subject.
    Model(Option<ModelRef>),
}

/// Projection of a task onto its identity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProjection {
    values: Vec<(IdentityField, IdentityValue)>,
}

impl IdentityProjection {
    /// Projects `task` onto `fields`.
    #[must_use]
    pub fn of(task: &Task, fields: &IdentityFields) -> Self {
        let values = fields
            .fields()
            .iter()
            .map(|field| (*field, value_of(task, *field)))
            .collect();
        Self { values }
    }

    /// Returns the projected `(field, value)` pairs.
    #[must_use]
    pub fn values(&self) -> &[(IdentityField, IdentityValue)] {
        &self.values
    }

    /// Returns whether the projection has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns whether `task` has the same values for every projected field.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.values
            .iter()
            .all(|(field, value)| value_of(task, *field) == *value)
    }
}

fn value_of(task: &Task, field: IdentityField) -> IdentityValue {
    match field {
        IdentityField::Title => IdentityValue::Text(Some(task.title().as_str().to_owned())),
        IdentityField::QueueName => {
            IdentityValue::Text(Some(task.queue_name().as_str().to_owned()))
        }
        IdentityField::MethodName => {
            IdentityValue::Text(Some(task.method_name().as_str().to_owned()))
        }
        IdentityField::ServiceName => {
            IdentityValue::Text(task.service_name().map(|name| name.as_str().to_owned()))
        }
        IdentityField::ModelRef => IdentityValue::Model(task.model_ref()),
    }
}

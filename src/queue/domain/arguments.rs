//! Serialized arguments carried by a task.

use super::QueueDomainError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Structured arguments passed to a task's operation when it runs.
///
/// Arguments are fixed when the task is dispatched. Scheduler-supplied
/// parameters are layered over them at invocation time with
/// [`TaskArguments::merged_with`], leaving the stored arguments untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskArguments(Map<String, Value>);

impl TaskArguments {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates arguments from a JSON value.
    ///
    /// `null` is treated as an empty map.
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::ArgumentsNotAnObject`] for any other
    /// non-object value.
    pub fn from_value(value: Value) -> Result<Self, QueueDomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            _ => Err(QueueDomainError::ArgumentsNotAnObject),
        }
    }

    /// Adds or replaces a single argument.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the argument stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the argument stored under `key` as a string slice.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy of these arguments with `overrides` layered on top.
    #[must_use]
    pub fn merged_with(&self, overrides: &Self) -> Self {
        let mut merged = self.0.clone();
        for (key, value) in &overrides.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }

    /// Returns the arguments as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl FromIterator<(String, Value)> for TaskArguments {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

//! Parsing of the flat `key=value` parameter set handed to scheduler passes.

use crate::queue::domain::{
    ModelRef, Outcome, QueueDomainError, QueueName, QueuedState, RelativePeriod, SortKey,
    TaskArguments, TaskId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing handler parameters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParamsError {
    /// An argument was not written as `key=value`.
    #[error("malformed parameter '{0}', expected key=value")]
    Malformed(String),

    /// A recognised key carried a value that failed to parse.
    #[error("invalid value '{value}' for parameter '{key}': {reason}")]
    InvalidValue {
        /// Parameter key.
        key: &'static str,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Either every value or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter<T> {
    /// No restriction (`*`).
    Any,
    /// Only the listed values.
    OneOf(Vec<T>),
}

impl<T: PartialEq> Filter<T> {
    /// Returns whether `value` passes the filter.
    #[must_use]
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(values) => values.contains(value),
        }
    }
}

impl<T: Clone> Filter<T> {
    /// Returns the explicit list, or `None` for [`Filter::Any`].
    #[must_use]
    pub fn to_list(&self) -> Option<Vec<T>> {
        match self {
            Self::Any => None,
            Self::OneOf(values) => Some(values.clone()),
        }
    }
}

/// Grace period override carried by the `gp` parameter and by profile
/// settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GraceParam {
    /// `*`: no grace filter.
    Disabled,
    /// Compare the profile's grace field against this period.
    Period(RelativePeriod),
}

impl GraceParam {
    /// Returns the period to filter by, or `None` when disabled.
    #[must_use]
    pub fn into_period(self) -> Option<RelativePeriod> {
        match self {
            Self::Disabled => None,
            Self::Period(period) => Some(period),
        }
    }
}

impl TryFrom<&str> for GraceParam {
    type Error = QueueDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.trim() == "*" {
            return Ok(Self::Disabled);
        }
        RelativePeriod::parse(value).map(Self::Period)
    }
}

impl TryFrom<String> for GraceParam {
    type Error = QueueDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<GraceParam> for String {
    fn from(value: GraceParam) -> Self {
        match value {
            GraceParam::Disabled => "*".to_owned(),
            GraceParam::Period(period) => period.to_string(),
        }
    }
}

/// Parsed scheduler parameters.
///
/// Every recognised key is optional; unset keys fall back to the handler
/// profile. Unrecognised keys are kept in [`HandlerParams::passthrough`] and
/// handed to invoked operations as string arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerParams {
    /// `qn`: queue name filter.
    pub queue_name: Option<QueueName>,
    /// `bs`: batch size.
    pub batch_size: Option<usize>,
    /// `po`: secondary processing order.
    pub processing_order: Option<Vec<SortKey>>,
    /// `qs`: state filter.
    pub states: Option<Filter<QueuedState>>,
    /// `oc`: outcome filter.
    pub outcomes: Option<Filter<Outcome>>,
    /// `gp`: grace period.
    pub grace_period: Option<GraceParam>,
    /// `tid`: single task.
    pub task_id: Option<TaskId>,
    /// `mid`: single subject.
    pub model_ref: Option<ModelRef>,
    /// `rd`: reference time replacing "now".
    pub run_date: Option<DateTime<Utc>>,
    /// Unrecognised parameters.
    pub passthrough: TaskArguments,
}

impl HandlerParams {
    /// Parses `key=value` command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Malformed`] for arguments without `=` and
    /// [`ParamsError::InvalidValue`] for recognised keys with bad values.
    pub fn from_args<I, S>(args: I) -> Result<Self, ParamsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs = args
            .into_iter()
            .map(|arg| split_assignment(arg.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_pairs(pairs)
    }

    /// Parses already-split key/value pairs. Later keys override earlier
    /// ones.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::InvalidValue`] for recognised keys with bad
    /// values.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ParamsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.apply(key.as_ref().trim(), value.as_ref().trim())?;
        }
        Ok(params)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ParamsError> {
        match key {
            "qn" => {
                self.queue_name = Some(parse_with("qn", value, |raw| QueueName::new(raw))?);
            }
            "bs" => self.batch_size = Some(parse_batch_size(value)?),
            "po" => {
                let order = parse_with("po", value, SortKey::parse_list)?;
                if order.is_empty() {
                    return Err(invalid("po", value, "at least one sort clause is required"));
                }
                self.processing_order = Some(order);
            }
            "qs" => {
                self.states = Some(parse_filter("qs", value, |item| {
                    QueuedState::try_from(item).map_err(|err| err.to_string())
                })?);
            }
            "oc" => {
                self.outcomes = Some(parse_filter("oc", value, |item| {
                    Outcome::try_from(item).map_err(|err| err.to_string())
                })?);
            }
            "gp" => {
                self.grace_period = Some(parse_with("gp", value, |raw| GraceParam::try_from(raw))?);
            }
            "tid" => self.task_id = Some(TaskId::new(parse_integer("tid", value)?)),
            "mid" => self.model_ref = Some(ModelRef::new(parse_integer("mid", value)?)),
            "rd" => {
                let run_date = DateTime::parse_from_rfc3339(value)
                    .map_err(|err| invalid("rd", value, err))?;
                self.run_date = Some(run_date.with_timezone(&Utc));
            }
            _ => {
                self.passthrough = std::mem::take(&mut self.passthrough)
                    .with(key, Value::String(value.to_owned()));
            }
        }
        Ok(())
    }
}

/// Splits `key=value` at the first `=`.
///
/// # Errors
///
/// Returns [`ParamsError::Malformed`] when there is no `=` or the key is
/// empty.
pub fn split_assignment(arg: &str) -> Result<(String, String), ParamsError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.trim().to_owned()))
        }
        _ => Err(ParamsError::Malformed(arg.to_owned())),
    }
}

fn invalid(key: &'static str, value: &str, reason: impl fmt::Display) -> ParamsError {
    ParamsError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: reason.to_string(),
    }
}

fn parse_with<T, E: fmt::Display>(
    key: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, ParamsError> {
    parse(value).map_err(|err| invalid(key, value, err))
}

fn parse_integer(key: &'static str, value: &str) -> Result<i64, ParamsError> {
    value.parse::<i64>().map_err(|err| invalid(key, value, err))
}

fn parse_batch_size(value: &str) -> Result<usize, ParamsError> {
    let size = value.parse::<usize>().map_err(|err| invalid("bs", value, err))?;
    if size == 0 {
        return Err(invalid("bs", value, "batch size must be positive"));
    }
    Ok(size)
}

fn parse_filter<T>(
    key: &'static str,
    value: &str,
    parse_item: impl Fn(&str) -> Result<T, String>,
) -> Result<Filter<T>, ParamsError> {
    if value == "*" {
        return Ok(Filter::Any);
    }
    let items = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_item(item).map_err(|reason| invalid(key, value, reason)))
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Err(invalid(key, value, "expected '*' or a comma-separated list"));
    }
    Ok(Filter::OneOf(items))
}

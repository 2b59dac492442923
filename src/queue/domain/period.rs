//! Relative time expressions and the task date fields they are compared to.

use super::{QueueDomainError, state::normalize};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset from a reference time, written as e.g. `now`, `-2 days` or
/// `+1 day 6 hours`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePeriod {
    expression: String,
    offset: TimeDelta,
}

impl RelativePeriod {
    /// The zero offset.
    #[must_use]
    pub fn now() -> Self {
        Self {
            expression: "now".to_owned(),
            offset: TimeDelta::zero(),
        }
    }

    /// Parses a relative period expression.
    ///
    /// Accepted forms are `now` or one or more `<signed integer> <unit>`
    /// terms, where unit is one of seconds, minutes, hours, days or weeks
    /// (singular, plural or abbreviated).
    ///
    /// # Errors
    ///
    /// Returns [`QueueDomainError::InvalidPeriod`] when the expression does
    /// not follow that grammar or overflows.
    pub fn parse(expression: &str) -> Result<Self, QueueDomainError> {
        let invalid = || QueueDomainError::InvalidPeriod(expression.to_owned());
        let trimmed = expression.trim();
        if trimmed.eq_ignore_ascii_case("now") {
            return Ok(Self::now());
        }

        let tokens = split_terms(trimmed);
        if tokens.is_empty() {
            return Err(invalid());
        }

        let mut offset = TimeDelta::zero();
        for pair in tokens.chunks(2) {
            let [amount, unit] = pair else {
                return Err(invalid());
            };
            let value = amount
                .trim_start_matches('+')
                .parse::<i64>()
                .map_err(|_| invalid())?;
            let term = unit_delta(unit, value).ok_or_else(invalid)?;
            offset = offset.checked_add(&term).ok_or_else(invalid)?;
        }

        Ok(Self {
            expression: trimmed.to_owned(),
            offset,
        })
    }

    /// Returns the offset this expression denotes.
    #[must_use]
    pub const fn offset(&self) -> TimeDelta {
        self.offset
    }

    /// Returns the original expression.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Applies the offset to `reference`.
    ///
    /// Returns `None` if the result is outside the representable range.
    #[must_use]
    pub fn resolve(&self, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
        reference.checked_add_signed(self.offset)
    }
}

impl fmt::Display for RelativePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl TryFrom<String> for RelativePeriod {
    type Error = QueueDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelativePeriod> for String {
    fn from(value: RelativePeriod) -> Self {
        value.expression
    }
}

/// Splits `-2days 3 h` into `["-2", "days", "3", "h"]`.
fn split_terms(expression: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in expression.split_whitespace() {
        let split_at = word
            .find(|ch: char| ch.is_ascii_alphabetic())
            .unwrap_or(word.len());
        let (amount, unit) = word.split_at(split_at);
        tokens.extend(
            [amount, unit]
                .into_iter()
                .filter(|part| !part.is_empty())
                .map(str::to_owned),
        );
    }
    tokens
}

fn unit_delta(unit: &str, value: i64) -> Option<TimeDelta> {
    match unit.to_ascii_lowercase().as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => TimeDelta::try_seconds(value),
        "m" | "min" | "mins" | "minute" | "minutes" => TimeDelta::try_minutes(value),
        "h" | "hr" | "hrs" | "hour" | "hours" => TimeDelta::try_hours(value),
        "d" | "day" | "days" => TimeDelta::try_days(value),
        "w" | "week" | "weeks" => TimeDelta::try_weeks(value),
        _ => None,
    }
}

/// Date fields of a task that grace periods and sorting can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    /// Earliest time the task may run.
    EventDate,
    /// Time the task was (re)queued.
    QueuedDate,
    /// Time the task was last claimed.
    StartDate,
    /// Time the task reached a halt state.
    EndDate,
}

impl DateField {
    /// Returns the canonical storage column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventDate => "event_date",
            Self::QueuedDate => "queued_date",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DateField {
    type Error = QueueDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match normalize(value).as_str() {
            "eventdate" => Ok(Self::EventDate),
            "queueddate" => Ok(Self::QueuedDate),
            "startdate" => Ok(Self::StartDate),
            "enddate" => Ok(Self::EndDate),
            _ => Err(QueueDomainError::UnknownDateField(value.to_owned())),
        }
    }
}

//! Queued task state and outcome enumerations with their transition rules.

use super::{ParseOutcomeError, ParseQueuedStateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuedState {
    /// Task is being set up and is not yet eligible to run.
    Initialising,
    /// Task is ready to run.
    Queued,
    /// Task is waiting for another execution slice or resource.
    Waiting,
    /// Task has been claimed by a scheduler pass.
    Running,
    /// Task has been manually paused.
    Paused,
    /// Task has been cancelled.
    Cancelled,
    /// Task finished processing; see its outcome.
    Completed,
    /// An equivalent active task already existed when this one was queued.
    Duplicate,
}

impl QueuedState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Initialising,
        Self::Queued,
        Self::Waiting,
        Self::Running,
        Self::Paused,
        Self::Cancelled,
        Self::Completed,
        Self::Duplicate,
    ];

    /// States from which a task may be claimed.
    pub const READY: [Self; 2] = [Self::Queued, Self::Waiting];

    /// States in which a task is being executed.
    pub const RUNNING: [Self; 1] = [Self::Running];

    /// Terminal states.
    pub const HALT: [Self; 3] = [Self::Cancelled, Self::Completed, Self::Duplicate];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialising => "initialising",
            Self::Queued => "queued",
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::Duplicate => "duplicate",
        }
    }

    /// Returns whether a task in this state may be claimed.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Queued | Self::Waiting)
    }

    /// Returns whether a task in this state is being executed.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns whether this is a halt (terminal) state.
    #[must_use]
    pub const fn is_halt(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Duplicate)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Initialising, Self::Queued | Self::Duplicate)
                | (Self::Duplicate, Self::Queued | Self::Cancelled)
                | (Self::Queued, Self::Running | Self::Cancelled)
                | (
                    Self::Running,
                    Self::Cancelled | Self::Completed | Self::Paused | Self::Waiting
                )
                | (Self::Waiting, Self::Cancelled | Self::Paused | Self::Running)
                | (Self::Paused, Self::Queued | Self::Cancelled)
        )
    }
}

impl fmt::Display for QueuedState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for QueuedState {
    type Error = ParseQueuedStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match normalize(value).as_str() {
            "initialising" | "initializing" => Ok(Self::Initialising),
            "queued" => Ok(Self::Queued),
            "waiting" => Ok(Self::Waiting),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            "duplicate" => Ok(Self::Duplicate),
            _ => Err(ParseQueuedStateError(value.to_owned())),
        }
    }
}

/// Result classification of a task, independent of its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The task has not run yet.
    NotDetermined,
    /// The task is running and its result is pending.
    Determining,
    /// The operation reported success.
    Success,
    /// The operation reported failure.
    Failed,
    /// The operation raised an error, timed out, or could not be resolved.
    Error,
}

impl Outcome {
    /// Every outcome, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::NotDetermined,
        Self::Determining,
        Self::Success,
        Self::Failed,
        Self::Error,
    ];

    /// Outcomes a selectable task may carry.
    pub const READY: [Self; 2] = [Self::NotDetermined, Self::Determining];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotDetermined => "not_determined",
            Self::Determining => "determining",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Parses a case- and separator-insensitive outcome name.
    fn from_name(value: &str) -> Option<Self> {
        match normalize(value).as_str() {
            "notdetermined" => Some(Self::NotDetermined),
            "determining" => Some(Self::Determining),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Returns whether this outcome records a finished execution.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Error)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Outcome {
    type Error = ParseOutcomeError;

    fn try_from(value: &str) -> Result<Self, ParseOutcomeError> {
        Self::from_name(value).ok_or_else(|| ParseOutcomeError(value.to_owned()))
    }
}

/// Lowercases and strips separators so `NotDetermined`, `not_determined` and
/// `not-determined` all parse the same way.
pub(super) fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

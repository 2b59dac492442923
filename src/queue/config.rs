//! Queue configuration loaded from JSON.
//!
//! A representative file is:
//!
//! ```json
//! {
//!   "runner": { "batch_size": 25, "queue_name": "mail" },
//!   "dispatch": { "method_name": "execute", "priority": 10 },
//!   "templates": {
//!     "nightly-report": { "title": "Nightly report", "method_name": "report" }
//!   },
//!   "identity": ["title", "method_name", "model_ref"],
//!   "archive": { "allow_archive_failed": false, "delete_on_archive": true },
//!   "default_timeout_secs": 300
//! }
//! ```
//!
//! Every key is optional.

use super::{
    domain::{DateField, IdentityFields, Outcome, QueueName, QueuedState, SortKey},
    ports::{OperationRegistry, TaskRepository},
    services::{
        ArchivePolicy, DispatchDefaults, Filter, GraceParam, HandlerProfile, QueueRunner,
        TaskArchiver, TaskDispatcher,
    },
};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "TASKQUEUE_CONFIG";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read queue config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("failed to parse queue config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Partial override of a [`HandlerProfile`].
///
/// Unset fields keep the built-in profile's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileSettings {
    /// Queue to scan.
    pub queue_name: Option<QueueName>,
    /// Admitted states.
    pub states: Option<Filter<QueuedState>>,
    /// Admitted outcomes.
    pub outcomes: Option<Filter<Outcome>>,
    /// Maximum number of tasks per pass.
    pub batch_size: Option<usize>,
    /// Secondary order applied after priority.
    pub processing_order: Option<Vec<SortKey>>,
    /// Grace period; `"*"` switches the grace filter off.
    pub grace_period: Option<GraceParam>,
    /// Date field compared against the grace period.
    pub grace_field: Option<DateField>,
}

impl ProfileSettings {
    /// Applies the set fields to `base`.
    #[must_use]
    pub fn apply_to(&self, base: HandlerProfile) -> HandlerProfile {
        HandlerProfile {
            queue_name: self.queue_name.clone().unwrap_or(base.queue_name),
            states: self.states.clone().unwrap_or(base.states),
            outcomes: self.outcomes.clone().unwrap_or(base.outcomes),
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            processing_order: self
                .processing_order
                .clone()
                .unwrap_or(base.processing_order),
            grace_period: self
                .grace_period
                .clone()
                .map_or(base.grace_period, GraceParam::into_period),
            grace_field: self.grace_field.or(base.grace_field),
        }
    }
}

/// Complete queue configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Overrides of the scheduler pass profile.
    pub runner: ProfileSettings,
    /// Overrides of the cleanup sweep profile.
    pub cleaner: ProfileSettings,
    /// Dispatch defaults.
    pub dispatch: DispatchDefaults,
    /// Named dispatch templates.
    pub templates: BTreeMap<String, DispatchDefaults>,
    /// Fields compared by duplicate detection.
    pub identity: IdentityFields,
    /// Archival policy.
    pub archive: ArchivePolicy,
    /// Budget for tasks that carry none of their own.
    pub default_timeout_secs: Option<u64>,
}

impl QueueSettings {
    /// Reads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_path = path.as_ref();
        let contents = std::fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: file_path.to_path_buf(),
            source,
        })
    }

    /// Reads settings from the file named by [`CONFIG_PATH_ENV`], or returns
    /// the defaults when the variable is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the named file cannot be read or parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        std::env::var_os(CONFIG_PATH_ENV).map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Returns the effective scheduler pass profile.
    #[must_use]
    pub fn runner_profile(&self) -> HandlerProfile {
        self.runner.apply_to(HandlerProfile::runner())
    }

    /// Returns the effective cleanup sweep profile.
    #[must_use]
    pub fn cleaner_profile(&self) -> HandlerProfile {
        self.cleaner.apply_to(HandlerProfile::cleaner())
    }

    /// Returns the default execution budget.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }

    /// Builds a dispatcher with these defaults and templates.
    #[must_use]
    pub fn dispatcher<R, C>(&self, repository: Arc<R>, clock: Arc<C>) -> TaskDispatcher<R, C>
    where
        R: TaskRepository,
        C: Clock + Send + Sync,
    {
        self.templates.iter().fold(
            TaskDispatcher::new(
                repository,
                clock,
                self.identity.clone(),
                self.dispatch.clone(),
            ),
            |dispatcher, (name, template)| dispatcher.with_template(name.clone(), template.clone()),
        )
    }

    /// Builds a scheduler pass runner with the runner profile.
    #[must_use]
    pub fn runner<R, O, C>(
        &self,
        repository: Arc<R>,
        registry: Arc<O>,
        clock: Arc<C>,
    ) -> QueueRunner<R, O, C>
    where
        R: TaskRepository,
        O: OperationRegistry,
        C: Clock + Send + Sync,
    {
        QueueRunner::new(repository, registry, clock)
            .with_profile(self.runner_profile())
            .with_default_timeout(self.default_timeout())
    }

    /// Builds an archiver with the cleaner profile and archive policy.
    #[must_use]
    pub fn archiver<R, C>(&self, repository: Arc<R>, clock: Arc<C>) -> TaskArchiver<R, C>
    where
        R: TaskRepository,
        C: Clock + Send + Sync,
    {
        TaskArchiver::new(repository, clock, self.archive).with_profile(self.cleaner_profile())
    }
}

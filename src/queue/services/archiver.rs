//! Removal of halted tasks.

use super::{HandlerParams, HandlerProfile, QueueServiceResult, SelectionConfig, TaskSelector};
use crate::queue::{domain::Task, ports::TaskRepository};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Archival settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchivePolicy {
    /// Whether tasks with a [`crate::queue::domain::Outcome::Failed`]
    /// outcome may be archived without forcing.
    pub allow_archive_failed: bool,
    /// Delete records instead of stamping them as archived.
    pub delete_on_archive: bool,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            allow_archive_failed: true,
            delete_on_archive: true,
        }
    }
}

/// Tally of one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Tasks matching the cleanup selection before the batch limit.
    pub matched: u64,
    /// Tasks archived by this sweep.
    pub archived: usize,
    /// Selected tasks that were left in place.
    pub skipped: usize,
}

/// Deletes or soft-archives halted tasks.
pub struct TaskArchiver<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    clock: Arc<C>,
    selector: TaskSelector<R, C>,
    policy: ArchivePolicy,
    profile: HandlerProfile,
}

impl<R, C> TaskArchiver<R, C>
where
    R: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates an archiver with the default cleaner profile.
    #[must_use]
    pub fn new(repository: Arc<R>, clock: Arc<C>, policy: ArchivePolicy) -> Self {
        Self {
            selector: TaskSelector::new(Arc::clone(&repository), Arc::clone(&clock)),
            repository,
            clock,
            policy,
            profile: HandlerProfile::cleaner(),
        }
    }

    /// Replaces the cleanup selection profile.
    #[must_use]
    pub fn with_profile(mut self, profile: HandlerProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Returns whether `task` may be archived without forcing.
    #[must_use]
    pub fn can_archive(&self, task: &Task) -> bool {
        task.can_archive(self.policy.allow_archive_failed)
    }

    /// Archives `task` if it is halted and either `force` is set or
    /// [`Self::can_archive`] holds.
    ///
    /// Returns whether the task was archived. Tasks outside a halt state are
    /// never archived, forced or not.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError::Repository`] when the delete or
    /// update fails.
    pub async fn archive(&self, task: &Task, force: bool) -> QueueServiceResult<bool> {
        if !task.is_complete() || task.is_archived() {
            return Ok(false);
        }
        if !force && !self.can_archive(task) {
            debug!(task_id = %task.id(), outcome = %task.outcome(), "task kept by archive policy");
            return Ok(false);
        }

        if self.policy.delete_on_archive {
            return Ok(self.repository.delete(task.id()).await?);
        }
        let mut archived = task.clone();
        archived.mark_archived(&*self.clock);
        self.repository.update(&archived).await?;
        Ok(true)
    }

    /// Archives every halted task selected by the cleaner profile and
    /// `params`, forcing past the failed-outcome gate.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError`] when selection or a write fails.
    pub async fn sweep(&self, params: &HandlerParams) -> QueueServiceResult<SweepSummary> {
        let config = SelectionConfig::from_params(&self.profile, params);
        let selection = self.selector.select(&config).await?;

        let mut summary = SweepSummary {
            matched: selection.matched(),
            ..SweepSummary::default()
        };
        for task in selection {
            if self.archive(&task, true).await? {
                summary.archived += 1;
            } else {
                summary.skipped += 1;
            }
        }

        info!(
            archived = summary.archived,
            skipped = summary.skipped,
            matched = summary.matched,
            "archived {} tasks of {}",
            summary.archived,
            summary.matched
        );
        Ok(summary)
    }
}

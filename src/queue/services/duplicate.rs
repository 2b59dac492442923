//! Duplicate suppression at dispatch time.

use crate::queue::{
    domain::{IdentityFields, IdentityProjection, Task},
    ports::{TaskRepository, TaskRepositoryResult},
};
use std::sync::Arc;

/// Decides whether a candidate task repeats an active one.
///
/// Two tasks are equivalent when they agree on every configured identity
/// field. Only tasks outside a halt state count, so a completed task never
/// blocks a new one.
#[derive(Clone)]
pub struct DuplicateDetector<R>
where
    R: TaskRepository,
{
    repository: Arc<R>,
    fields: IdentityFields,
}

impl<R> DuplicateDetector<R>
where
    R: TaskRepository,
{
    /// Creates a detector comparing `fields`.
    #[must_use]
    pub const fn new(repository: Arc<R>, fields: IdentityFields) -> Self {
        Self { repository, fields }
    }

    /// Returns the compared identity fields.
    #[must_use]
    pub const fn fields(&self) -> &IdentityFields {
        &self.fields
    }

    /// Returns whether an active task with the same identity exists.
    ///
    /// Always `false` when no identity fields are configured.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the lookup fails.
    pub async fn is_duplicate(&self, candidate: &Task) -> TaskRepositoryResult<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        let projection = IdentityProjection::of(candidate, &self.fields);
        let active = self.repository.count_active_matching(&projection).await?;
        Ok(active > 0)
    }
}

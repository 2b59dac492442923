//! One scheduler pass: select a batch, execute it in order, report.

use super::{
    ExecutionReport, HandlerParams, HandlerProfile, QueueServiceResult, SelectionConfig,
    TaskExecutor, TaskSelector,
};
use crate::queue::{
    domain::Outcome,
    ports::{OperationRegistry, TaskRepository},
};
use mockable::Clock;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Tasks matching the selection before the batch limit.
    pub matched: u64,
    /// Tasks in the batch.
    pub selected: usize,
    /// Tasks that were claimed and executed.
    pub processed: usize,
    /// Tasks skipped because they were not runnable or lost their claim.
    pub skipped: usize,
    /// Executions that ended in [`Outcome::Success`].
    pub succeeded: usize,
    /// Executions that ended in [`Outcome::Failed`].
    pub failed: usize,
    /// Executions that ended in [`Outcome::Error`].
    pub errored: usize,
}

impl PassSummary {
    const fn record(&mut self, report: &ExecutionReport) {
        match report {
            ExecutionReport::Skipped { .. } => self.skipped += 1,
            ExecutionReport::Completed { outcome, .. } => {
                self.processed += 1;
                match outcome {
                    Outcome::Success => self.succeeded += 1,
                    Outcome::Failed => self.failed += 1,
                    _ => self.errored += 1,
                }
            }
        }
    }

    /// Returns the human-readable pass report, e.g.
    /// `processed 2 tasks of 3`.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "processed {} tasks of {}", self.processed, self.matched)?;
        if self.skipped > 0 {
            write!(f, ", skipped {}", self.skipped)?;
        }
        Ok(())
    }
}

/// Scheduler loop entry point, invoked once per external trigger.
pub struct QueueRunner<R, O, C>
where
    R: TaskRepository,
    O: OperationRegistry,
    C: Clock + Send + Sync,
{
    selector: TaskSelector<R, C>,
    executor: TaskExecutor<R, O, C>,
    profile: HandlerProfile,
}

impl<R, O, C> QueueRunner<R, O, C>
where
    R: TaskRepository,
    O: OperationRegistry,
    C: Clock + Send + Sync,
{
    /// Creates a runner using the default runner profile.
    #[must_use]
    pub fn new(repository: Arc<R>, registry: Arc<O>, clock: Arc<C>) -> Self {
        Self {
            selector: TaskSelector::new(Arc::clone(&repository), Arc::clone(&clock)),
            executor: TaskExecutor::new(repository, registry, clock),
            profile: HandlerProfile::runner(),
        }
    }

    /// Replaces the selection profile.
    #[must_use]
    pub fn with_profile(mut self, profile: HandlerProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the budget for tasks that carry none of their own.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.executor = self.executor.with_default_timeout(timeout);
        self
    }

    /// Runs one pass.
    ///
    /// Tasks are executed sequentially in selection order. Operation
    /// failures are recorded per task and never stop the batch.
    ///
    /// # Errors
    ///
    /// Returns [`super::QueueServiceError`] when selection fails or the store
    /// rejects a write; the rest of the batch is abandoned.
    pub async fn run_pass(&self, params: &HandlerParams) -> QueueServiceResult<PassSummary> {
        let config = SelectionConfig::from_params(&self.profile, params);
        let selection = self.selector.select(&config).await?;

        let mut summary = PassSummary {
            matched: selection.matched(),
            selected: selection.len(),
            ..PassSummary::default()
        };
        for task in selection {
            let report = self.executor.execute(task, &params.passthrough).await?;
            summary.record(&report);
        }

        info!(
            processed = summary.processed,
            matched = summary.matched,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            failed = summary.failed,
            errored = summary.errored,
            "{summary}"
        );
        Ok(summary)
    }
}

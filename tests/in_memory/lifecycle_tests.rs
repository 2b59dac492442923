//! In-memory integration tests for administrative task transitions.

use super::helpers::{QueueHarness, harness};
use eyre::{bail, ensure};
use rstest::rstest;
use taskqueue::queue::{
    domain::{QueueDomainError, QueuedState, TaskId},
    services::{QueueServiceError, TransitionTaskRequest},
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn queued_task_can_be_cancelled(harness: QueueHarness) -> eyre::Result<()> {
    let task = harness.dispatch("Cancel me", "noop").await?;

    let cancelled = harness.lifecycle.cancel(task.id()).await?;

    ensure!(cancelled.state() == QueuedState::Cancelled);
    ensure!(cancelled.end_date().is_some());
    ensure!(harness.reload(task.id()).await? == cancelled);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_can_be_requeued(harness: QueueHarness) -> eyre::Result<()> {
    harness.dispatch("Twice", "noop").await?;
    let duplicate = harness.dispatch("Twice", "noop").await?;
    ensure!(duplicate.state() == QueuedState::Duplicate);

    let requeued = harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(duplicate.id(), "queued"))
        .await?;

    ensure!(requeued.state() == QueuedState::Queued);
    ensure!(requeued.end_date().is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn illegal_transition_is_rejected(harness: QueueHarness) -> eyre::Result<()> {
    let task = harness.dispatch("Queued", "noop").await?;

    let result = harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(task.id(), "completed"))
        .await;

    if !matches!(
        result,
        Err(QueueServiceError::Domain(
            QueueDomainError::IllegalTransition { .. }
        ))
    ) {
        bail!("expected illegal transition, got {result:?}");
    }
    ensure!(harness.reload(task.id()).await?.state() == QueuedState::Queued);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_state_name_is_rejected(harness: QueueHarness) -> eyre::Result<()> {
    let task = harness.dispatch("Queued", "noop").await?;

    let result = harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(task.id(), "sleeping"))
        .await;

    ensure!(matches!(result, Err(QueueServiceError::InvalidState(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_task_is_reported(harness: QueueHarness) {
    let result = harness.lifecycle.cancel(TaskId::new(404)).await;

    assert!(matches!(
        result,
        Err(QueueServiceError::NotFound(id)) if id == TaskId::new(404)
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn running_task_requires_forced_transition(harness: QueueHarness) -> eyre::Result<()> {
    let task = harness.dispatch("Long job", "noop").await?;
    harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(task.id(), "running"))
        .await?;

    let refused = harness.lifecycle.cancel(task.id()).await;
    ensure!(matches!(refused, Err(QueueServiceError::Claimed(_))));

    let waiting = harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(task.id(), "waiting").forced())
        .await?;
    ensure!(waiting.state() == QueuedState::Waiting);
    ensure!(waiting.can_run());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_by_id_returns_stored_task(harness: QueueHarness) -> eyre::Result<()> {
    let task = harness.dispatch("Lookup", "noop").await?;

    ensure!(harness.lifecycle.find_by_id(task.id()).await? == Some(task));
    ensure!(harness.lifecycle.find_by_id(TaskId::new(999)).await?.is_none());
    Ok(())
}

//! `PostgreSQL` tests for storing, updating and deleting task records.

use super::helpers::{PreparedRepo, prepared_repo};
use eyre::{bail, ensure};
use rstest::rstest;
use std::time::Duration;
use taskqueue::queue::{
    domain::{ModelRef, QueuedState, ServiceName, TaskArguments},
    ports::{TaskFilter, TaskRepository, TaskRepositoryError},
    services::DispatchRequest,
};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stored_task_reads_back_its_columns(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let arguments = TaskArguments::new()
        .with("account", 17)
        .with("mode", "full");
    let task = prepared
        .dispatch(
            DispatchRequest::new("Rebuild index")
                .with_queue_name("search")
                .with_service_name("indexer")
                .with_method_name("rebuild")
                .with_priority(3)
                .with_arguments(arguments.clone())
                .with_model_ref(ModelRef::new(9))
                .with_timeout(Duration::from_secs(30))
                .with_queued_by("admin"),
        )
        .await?;

    let stored = prepared.reload(task.id()).await?;

    ensure!(stored.title().as_str() == "Rebuild index");
    ensure!(stored.queue_name().as_str() == "search");
    ensure!(stored.service_name().map(ServiceName::as_str) == Some("indexer"));
    ensure!(stored.method_name().as_str() == "rebuild");
    ensure!(stored.priority() == 3);
    ensure!(stored.arguments() == &arguments);
    ensure!(stored.model_ref() == Some(ModelRef::new(9)));
    ensure!(stored.timeout() == Some(Duration::from_secs(30)));
    ensure!(stored.queued_by() == Some("admin"));
    ensure!(stored.state() == QueuedState::Queued);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn storing_an_existing_id_is_rejected(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let task = prepared
        .dispatch(DispatchRequest::new("Once").with_method_name("work"))
        .await?;

    match prepared.repo.store(&task).await {
        Err(TaskRepositoryError::DuplicateTask(id)) if id == task.id() => Ok(()),
        other => bail!("expected DuplicateTask for {}, got {other:?}", task.id()),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn updating_a_deleted_task_is_not_found(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let task = prepared
        .dispatch(DispatchRequest::new("Short lived").with_method_name("work"))
        .await?;

    ensure!(prepared.repo.delete(task.id()).await?);
    ensure!(!prepared.repo.delete(task.id()).await?);
    ensure!(prepared.repo.find_by_id(task.id()).await?.is_none());
    match prepared.repo.update(&task).await {
        Err(TaskRepositoryError::NotFound(id)) if id == task.id() => Ok(()),
        other => bail!("expected NotFound for {}, got {other:?}", task.id()),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn each_test_gets_its_own_database(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
    #[from(prepared_repo)] other_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let (Some(prepared), Some(other)) = (prepared_repo?, other_repo?) else {
        return Ok(());
    };
    prepared
        .dispatch(DispatchRequest::new("Private").with_method_name("work"))
        .await?;

    ensure!(prepared.database().url()? != other.database().url()?);
    ensure!(other.repo.count(&TaskFilter::default()).await? == 0);
    Ok(())
}

//! `PostgreSQL` tests for selection filters, ordering and limits.

use super::helpers::{PreparedRepo, params, prepared_repo};
use chrono::{DateTime, TimeDelta, Utc};
use eyre::ensure;
use rstest::rstest;
use taskqueue::queue::{
    domain::{ModelRef, QueuedState, TaskId},
    services::{DispatchRequest, HandlerProfile, SelectionConfig},
};

async fn seed_priorities(prepared: &PreparedRepo) -> eyre::Result<Vec<TaskId>> {
    let mut ids = Vec::new();
    for (title, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 1)] {
        let task = prepared
            .dispatch(
                DispatchRequest::new(title)
                    .with_method_name("work")
                    .with_priority(priority),
            )
            .await?;
        ids.push(task.id());
    }
    Ok(ids)
}

#[rstest]
#[case::default_order(&["bs=3"], &[1, 3, 0])]
#[case::id_descending(&["bs=3", "po=id desc"], &[3, 1, 2])]
#[case::title_descending(&["po=title desc"], &[3, 1, 2, 0])]
#[tokio::test(flavor = "multi_thread")]
async fn selection_orders_by_priority_first(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
    #[case] args: &[&str],
    #[case] expected: &[usize],
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let ids = seed_priorities(&prepared).await?;
    let config = SelectionConfig::from_params(&HandlerProfile::runner(), &params(args));

    let selection = prepared.selector().select(&config).await?;

    let selected = selection.tasks().iter().map(|task| task.id()).collect::<Vec<_>>();
    let wanted = expected
        .iter()
        .filter_map(|index| ids.get(*index).copied())
        .collect::<Vec<_>>();
    ensure!(selected == wanted, "expected {wanted:?}, got {selected:?}");
    ensure!(selection.matched() == 4);
    Ok(())
}

#[rstest]
#[case::at_the_bound("rd=2026-01-12T09:00:00Z", true)]
#[case::after_the_bound("rd=2026-01-12T09:00:01Z", true)]
#[case::before_the_bound("rd=2026-01-12T08:59:59Z", false)]
#[tokio::test(flavor = "multi_thread")]
async fn grace_bound_includes_its_reference_time(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
    #[case] run_date: &str,
    #[case] selected: bool,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let event_date = DateTime::parse_from_rfc3339("2026-01-12T09:00:00Z")?.with_timezone(&Utc);
    let task = prepared
        .dispatch(
            DispatchRequest::new("Scheduled")
                .with_method_name("work")
                .with_event_date(event_date),
        )
        .await?;
    let config = SelectionConfig::from_params(&HandlerProfile::runner(), &params(&[run_date]));

    let selection = prepared.selector().select(&config).await?;

    let found = selection.tasks().iter().any(|candidate| candidate.id() == task.id());
    ensure!(found == selected, "{run_date}: expected selected={selected}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wildcard_filters_keep_queue_and_grace_bounds(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let on_hold = prepared
        .dispatch(
            DispatchRequest::new("On hold")
                .with_method_name("work")
                .with_queue_name("q1"),
        )
        .await?;
    prepared.lifecycle().cancel(on_hold.id()).await?;
    prepared
        .dispatch(
            DispatchRequest::new("Later")
                .with_method_name("work")
                .with_queue_name("q1")
                .with_event_date(Utc::now() + TimeDelta::days(1)),
        )
        .await?;
    prepared
        .dispatch(
            DispatchRequest::new("Elsewhere")
                .with_method_name("work")
                .with_queue_name("q2"),
        )
        .await?;
    let config = SelectionConfig::from_params(
        &HandlerProfile::runner(),
        &params(&["qs=*", "oc=*", "qn=q1"]),
    );

    let selection = prepared.selector().select(&config).await?;

    let selected = selection.tasks().iter().map(|task| task.id()).collect::<Vec<_>>();
    ensure!(selected == vec![on_hold.id()], "got {selected:?}");
    ensure!(selection.matched() == 1);
    ensure!(prepared.reload(on_hold.id()).await?.state() == QueuedState::Cancelled);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn model_ref_selection_ignores_state_filters(
    prepared_repo: eyre::Result<Option<PreparedRepo>>,
) -> eyre::Result<()> {
    let Some(prepared) = prepared_repo? else {
        return Ok(());
    };
    let linked = prepared
        .dispatch(
            DispatchRequest::new("Linked")
                .with_method_name("work")
                .with_model_ref(ModelRef::new(42)),
        )
        .await?;
    prepared.lifecycle().cancel(linked.id()).await?;
    prepared
        .dispatch(DispatchRequest::new("Unlinked").with_method_name("work"))
        .await?;
    let config = SelectionConfig::from_params(&HandlerProfile::runner(), &params(&["mid=42"]));

    let selection = prepared.selector().select(&config).await?;

    let selected = selection.tasks().iter().map(|task| task.id()).collect::<Vec<_>>();
    ensure!(selected == vec![linked.id()], "got {selected:?}");
    Ok(())
}

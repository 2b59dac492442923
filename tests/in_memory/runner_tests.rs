//! In-memory integration tests for scheduler passes.

use super::helpers::{QueueHarness, Recorder, erroring, harness, method, params};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use eyre::ensure;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use taskqueue::queue::{
    adapters::memory::{InMemoryOperationRegistry, ServiceMethods, operation_fn},
    domain::{Outcome, QueuedState, ServiceName, TaskArguments},
    ports::{Invocation, OperationOutput, OperationResult, TaskOperation},
    services::{DispatchRequest, HandlerParams, TransitionTaskRequest},
};

struct Exploding;

#[async_trait]
impl TaskOperation for Exploding {
    async fn invoke(&self, _invocation: Invocation) -> OperationResult {
        panic!("operation exploded")
    }
}

fn sleeping(duration: Duration) -> Arc<dyn TaskOperation> {
    operation_fn(move |_| async move {
        tokio::time::sleep(duration).await;
        Ok(OperationOutput::succeeded())
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pass_records_outcome_of_each_operation(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(
            method("ok"),
            recorder.operation(OperationOutput::succeeded().with_message("all good")),
        )
        .with_operation(method("refuse"), recorder.operation(OperationOutput::failed()))
        .with_operation(method("boom"), erroring("disk full"));
    let ok = harness.dispatch("Succeeds", "ok").await?;
    let refused = harness.dispatch("Fails", "refuse").await?;
    let broken = harness.dispatch("Errors", "boom").await?;

    let summary = harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    ensure!(summary.processed == 3);
    ensure!((summary.succeeded, summary.failed, summary.errored) == (1, 1, 1));
    ensure!(summary.message() == "processed 3 tasks of 3");

    let succeeded = harness.reload(ok.id()).await?;
    ensure!(succeeded.state() == QueuedState::Completed);
    ensure!(succeeded.outcome() == Outcome::Success);
    ensure!(succeeded.message() == Some("all good"));
    ensure!(succeeded.start_date().is_some() && succeeded.end_date().is_some());

    ensure!(harness.reload(refused.id()).await?.outcome() == Outcome::Failed);

    let errored = harness.reload(broken.id()).await?;
    ensure!(errored.state() == QueuedState::Completed);
    ensure!(errored.outcome() == Outcome::Error);
    ensure!(errored.message() == Some("disk full"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn panicking_operation_is_recorded_as_error(harness: QueueHarness) -> eyre::Result<()> {
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("explode"), Arc::new(Exploding));
    let task = harness.dispatch("Explodes", "explode").await?;
    let after = harness.dispatch("Runs after", "noop").await?;

    let summary = harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    let exploded = harness.reload(task.id()).await?;
    ensure!(exploded.outcome() == Outcome::Error);
    ensure!(exploded.message() == Some("operation panicked"));
    ensure!(harness.reload(after.id()).await?.state() == QueuedState::Completed);
    ensure!(summary.errored == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn operation_exceeding_its_budget_times_out(harness: QueueHarness) -> eyre::Result<()> {
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("slow"), sleeping(Duration::from_secs(30)));
    let task = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Slow")
                .with_method_name("slow")
                .with_timeout(Duration::from_millis(50)),
        )
        .await?;

    harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    let timed_out = harness.reload(task.id()).await?;
    ensure!(timed_out.state() == QueuedState::Completed);
    ensure!(timed_out.outcome() == Outcome::Error);
    ensure!(
        timed_out
            .message()
            .is_some_and(|message| message.contains("timed out"))
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn runner_default_timeout_applies_to_tasks_without_budget(
    harness: QueueHarness,
) -> eyre::Result<()> {
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("slow"), sleeping(Duration::from_secs(30)));
    let task = harness.dispatch("Slow", "slow").await?;

    harness
        .runner(registry)
        .with_default_timeout(Some(Duration::from_millis(50)))
        .run_pass(&HandlerParams::default())
        .await?;

    ensure!(harness.reload(task.id()).await?.outcome() == Outcome::Error);
    Ok(())
}

#[rstest]
#[case::zero_task_budget(Some(Duration::ZERO), None)]
#[case::zero_default_budget(None, Some(Duration::ZERO))]
#[case::zero_task_budget_overrides_default(Some(Duration::ZERO), Some(Duration::from_millis(5)))]
#[tokio::test(flavor = "multi_thread")]
async fn zero_budget_means_no_limit(
    harness: QueueHarness,
    #[case] task_budget: Option<Duration>,
    #[case] default_budget: Option<Duration>,
) -> eyre::Result<()> {
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("nap"), sleeping(Duration::from_millis(50)));
    let request = DispatchRequest::new("Nap").with_method_name("nap");
    let task = harness
        .dispatcher
        .dispatch(match task_budget {
            Some(budget) => request.with_timeout(budget),
            None => request,
        })
        .await?;

    harness
        .runner(registry)
        .with_default_timeout(default_budget)
        .run_pass(&HandlerParams::default())
        .await?;

    let finished = harness.reload(task.id()).await?;
    ensure!(finished.state() == QueuedState::Completed);
    ensure!(
        finished.outcome() == Outcome::Success,
        "unexpected outcome {} ({:?})",
        finished.outcome(),
        finished.message()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unresolved_operations_are_recorded_as_errors(harness: QueueHarness) -> eyre::Result<()> {
    let registry = InMemoryOperationRegistry::new().with_service(
        ServiceName::new("billing")?,
        Arc::new(ServiceMethods::new()),
    );
    let unknown_method = harness.dispatch("Ghost", "ghost").await?;
    let unknown_service = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Ship")
                .with_method_name("ship")
                .with_service_name("shipping"),
        )
        .await?;
    let missing_method = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Refund")
                .with_method_name("refund")
                .with_service_name("billing"),
        )
        .await?;

    let summary = harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    ensure!(summary.errored == 3);
    let messages = [
        harness.reload(unknown_method.id()).await?,
        harness.reload(unknown_service.id()).await?,
        harness.reload(missing_method.id()).await?,
    ]
    .iter()
    .map(|task| task.message().map(str::to_owned))
    .collect::<Vec<_>>();
    ensure!(
        messages
            == [
                Some("no operation registered for method 'ghost'".to_owned()),
                Some("no service registered under 'shipping'".to_owned()),
                Some("service 'billing' has no method 'refund'".to_owned()),
            ]
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn service_tasks_run_the_service_method(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let billing = ServiceMethods::new()
        .with_method(method("charge"), recorder.operation(OperationOutput::succeeded()));
    let local = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("charge"), local.operation(OperationOutput::failed()))
        .with_service(ServiceName::new("billing")?, Arc::new(billing));
    let task = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Charge")
                .with_method_name("charge")
                .with_service_name("billing"),
        )
        .await?;

    harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    ensure!(recorder.task_ids() == [task.id()]);
    ensure!(local.calls().is_empty());
    ensure!(harness.reload(task.id()).await?.outcome() == Outcome::Success);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tasks_run_in_priority_then_creation_order(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    let mut dispatched = Vec::new();
    for (title, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 1)] {
        let task = harness
            .dispatcher
            .dispatch(
                DispatchRequest::new(title)
                    .with_method_name("work")
                    .with_priority(priority),
            )
            .await?;
        dispatched.push(task.id());
    }

    harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    let expected = [1, 3, 0, 2]
        .iter()
        .filter_map(|index| dispatched.get(*index).copied())
        .collect::<Vec<_>>();
    ensure!(recorder.task_ids() == expected);
    Ok(())
}

#[rstest]
#[case::id_descending("po=id desc", [3, 1, 2, 0])]
#[case::title_ascending("po=title asc", [1, 3, 0, 2])]
#[tokio::test(flavor = "multi_thread")]
async fn priority_leads_any_processing_order(
    harness: QueueHarness,
    #[case] order: &str,
    #[case] expected_order: [usize; 4],
) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    let mut dispatched = Vec::new();
    for (title, priority) in [("a", 5), ("b", 1), ("c", 5), ("d", 1)] {
        let task = harness
            .dispatcher
            .dispatch(
                DispatchRequest::new(title)
                    .with_method_name("work")
                    .with_priority(priority),
            )
            .await?;
        dispatched.push(task.id());
    }

    harness.runner(registry).run_pass(&params(&[order])).await?;

    let expected = expected_order
        .iter()
        .filter_map(|index| dispatched.get(*index).copied())
        .collect::<Vec<_>>();
    ensure!(recorder.task_ids() == expected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn wildcard_filters_keep_queue_and_grace_bounds(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    let on_hold = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("On hold")
                .with_method_name("work")
                .with_queue_name("q1"),
        )
        .await?;
    harness.lifecycle.cancel(on_hold.id()).await?;
    let future = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Later")
                .with_method_name("work")
                .with_queue_name("q1")
                .with_event_date(Utc::now() + TimeDelta::days(1)),
        )
        .await?;
    let elsewhere = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Elsewhere")
                .with_method_name("work")
                .with_queue_name("q2"),
        )
        .await?;

    let summary = harness
        .runner(registry)
        .run_pass(&params(&["qs=*", "oc=*", "qn=q1"]))
        .await?;

    ensure!(summary.matched == 1 && summary.selected == 1);
    ensure!(summary.skipped == 1, "the cancelled task is selected but not runnable");
    ensure!(recorder.calls().is_empty());
    ensure!(harness.reload(on_hold.id()).await?.state() == QueuedState::Cancelled);
    ensure!(harness.reload(future.id()).await?.state() == QueuedState::Queued);
    ensure!(harness.reload(elsewhere.id()).await?.state() == QueuedState::Queued);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_size_limits_pass_and_reports_matches(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    for title in ["first", "second", "third"] {
        harness.dispatch(title, "work").await?;
    }
    let runner = harness.runner(registry);

    let first_pass = runner.run_pass(&params(&["bs=2"])).await?;
    ensure!(first_pass.message() == "processed 2 tasks of 3");
    ensure!(first_pass.selected == 2);

    let second_pass = runner.run_pass(&params(&["bs=2"])).await?;
    ensure!(second_pass.message() == "processed 1 tasks of 1");

    let idle_pass = runner.run_pass(&HandlerParams::default()).await?;
    ensure!(idle_pass.message() == "processed 0 tasks of 0");
    ensure!(recorder.calls().len() == 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn passthrough_params_reach_the_operation_only(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("export"), recorder.operation(OperationOutput::succeeded()));
    let task = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Export")
                .with_method_name("export")
                .with_arguments(TaskArguments::new().with("format", "csv").with("mode", "full")),
        )
        .await?;

    harness
        .runner(registry)
        .run_pass(&params(&["mode=delta", "bs=5"]))
        .await?;

    let calls = recorder.calls();
    let call = calls
        .first()
        .ok_or_else(|| eyre::eyre!("operation was not invoked"))?;
    ensure!(call.arguments.get_str("mode") == Some("delta"));
    ensure!(call.arguments.get_str("format") == Some("csv"));
    ensure!(call.arguments.get("bs").is_none());

    let stored = harness.reload(task.id()).await?;
    ensure!(stored.arguments().get_str("mode") == Some("full"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn future_tasks_wait_for_their_event_date(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("later"), recorder.operation(OperationOutput::succeeded()));
    let event_date = Utc::now() + TimeDelta::days(1);
    let task = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Tomorrow")
                .with_method_name("later")
                .with_event_date(event_date),
        )
        .await?;
    let runner = harness.runner(registry);

    let now_pass = runner.run_pass(&HandlerParams::default()).await?;
    ensure!(now_pass.matched == 0);
    ensure!(harness.reload(task.id()).await?.state() == QueuedState::Queued);

    let run_date = (event_date + TimeDelta::minutes(1)).to_rfc3339();
    let future_pass = runner
        .run_pass(&params(&[format!("rd={run_date}").as_str()]))
        .await?;
    ensure!(future_pass.processed == 1);

    ensure!(recorder.task_ids() == [task.id()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn queue_name_partitions_passes(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("send"), recorder.operation(OperationOutput::succeeded()));
    let mail = harness
        .dispatcher
        .dispatch(
            DispatchRequest::new("Mail")
                .with_method_name("send")
                .with_queue_name("mail"),
        )
        .await?;
    let other = harness.dispatch("Default queue", "send").await?;

    let summary = harness
        .runner(registry)
        .run_pass(&params(&["qn=mail"]))
        .await?;

    ensure!(summary.processed == 1);
    ensure!(recorder.task_ids() == [mail.id()]);
    ensure!(harness.reload(other.id()).await?.state() == QueuedState::Queued);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn task_id_targets_a_single_task(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    harness.dispatch("first", "work").await?;
    let target = harness.dispatch("second", "work").await?;
    let runner = harness.runner(registry);

    let summary = runner
        .run_pass(&params(&[format!("tid={}", target.id()).as_str()]))
        .await?;
    ensure!(summary.processed == 1);
    ensure!(recorder.task_ids() == [target.id()]);

    let repeat = runner
        .run_pass(&params(&[format!("tid={}", target.id()).as_str()]))
        .await?;
    ensure!(repeat.processed == 0 && repeat.skipped == 1);
    ensure!(repeat.message() == "processed 0 tasks of 1, skipped 1");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn paused_tasks_are_not_selected(harness: QueueHarness) -> eyre::Result<()> {
    let recorder = Recorder::default();
    let registry = InMemoryOperationRegistry::new()
        .with_operation(method("work"), recorder.operation(OperationOutput::succeeded()));
    let paused = harness.dispatch("paused", "work").await?;
    harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(paused.id(), "running"))
        .await?;
    harness
        .lifecycle
        .transition_task(TransitionTaskRequest::new(paused.id(), "paused").forced())
        .await?;

    let summary = harness
        .runner(registry)
        .run_pass(&HandlerParams::default())
        .await?;

    ensure!(summary.matched == 0);
    ensure!(recorder.calls().is_empty());
    Ok(())
}

//! Then steps for task queue BDD scenarios.

use super::world::{QueueWorld, run_async};
use rstest_bdd_macros::then;
use taskqueue::queue::{
    domain::{Outcome, QueuedState},
    ports::{TaskFilter, TaskRepository},
};

#[then(r#"the last dispatched task is "{state}""#)]
fn last_dispatched_state(world: &QueueWorld, state: String) -> Result<(), eyre::Report> {
    let expected = QueuedState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let task = world
        .last_dispatched
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no task dispatched"))?;

    if task.state() != expected {
        return Err(eyre::eyre!(
            "expected state {expected}, found {}",
            task.state()
        ));
    }
    Ok(())
}

#[then(r#"the pass reports "{message}""#)]
fn pass_reports(world: &QueueWorld, message: String) -> Result<(), eyre::Report> {
    let summary = world
        .last_summary
        .ok_or_else(|| eyre::eyre!("no scheduler pass ran"))?;
    if summary.message() != message {
        return Err(eyre::eyre!(
            "expected report '{message}', got '{}'",
            summary.message()
        ));
    }
    Ok(())
}

#[then(r#"task "{title}" completed with outcome "{outcome}""#)]
fn task_outcome(world: &QueueWorld, title: String, outcome: String) -> Result<(), eyre::Report> {
    let expected = Outcome::try_from(outcome.as_str())
        .map_err(|err| eyre::eyre!("invalid expected outcome in scenario: {err}"))?;
    let dispatched = world
        .tasks_by_title
        .get(&title)
        .ok_or_else(|| eyre::eyre!("no task titled '{title}'"))?;
    let task = run_async(world.repo.find_by_id(dispatched.id()))?
        .ok_or_else(|| eyre::eyre!("task '{title}' missing from store"))?;

    if task.state() != QueuedState::Completed || task.outcome() != expected {
        return Err(eyre::eyre!(
            "expected completed/{expected}, found {}/{}",
            task.state(),
            task.outcome()
        ));
    }
    Ok(())
}

#[then("{count:u64} tasks remain queued")]
fn tasks_remain_queued(world: &QueueWorld, count: u64) -> Result<(), eyre::Report> {
    let filter = TaskFilter {
        states: Some(vec![QueuedState::Queued]),
        ..TaskFilter::default()
    };
    let queued = run_async(world.repo.count(&filter))?;
    if queued != count {
        return Err(eyre::eyre!("expected {count} queued tasks, found {queued}"));
    }
    Ok(())
}

#[then("{count:u64} tasks remain in the store")]
fn tasks_remain_stored(world: &QueueWorld, count: u64) -> Result<(), eyre::Report> {
    let filter = TaskFilter {
        include_archived: true,
        ..TaskFilter::default()
    };
    let stored = run_async(world.repo.count(&filter))?;
    if stored != count {
        return Err(eyre::eyre!("expected {count} stored tasks, found {stored}"));
    }
    Ok(())
}

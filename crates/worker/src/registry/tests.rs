use std::time::Duration;

use super::*;

fn io_spec(title: &str) -> TaskSpec {
	TaskSpec::new(title, TaskClass::IoBlocking)
}

#[test]
fn records_are_listed_newest_first() {
	let registry = TaskRegistry::new();
	let first = registry.register(io_spec("first"));
	let second = registry.register(io_spec("second"));

	let ids: Vec<_> = registry.tasks().into_iter().map(|t| t.id).collect();
	assert_eq!(ids, vec![second.id(), first.id()]);
}

#[test]
fn aggregate_progress_is_complete_when_idle() {
	let registry = TaskRegistry::new();
	assert_eq!(registry.aggregate_progress(), 1.0);

	let done = registry.register(io_spec("done"));
	done.set_progress(0.3);
	done.finish(TaskState::Succeeded);
	assert_eq!(registry.aggregate_progress(), 1.0);
}

#[test]
fn aggregate_progress_averages_running_tasks() {
	let registry = TaskRegistry::new();
	let a = registry.register(io_spec("a"));
	let b = registry.register(io_spec("b"));
	let c = registry.register(io_spec("c"));
	a.set_progress(0.2);
	b.set_work(3, 5);
	c.set_progress(1.0);
	c.finish(TaskState::Failed("disk full".into()));

	let progress = registry.aggregate_progress();
	assert!((progress - 0.4).abs() < 1e-9, "got {progress}");
}

#[test]
fn progress_is_clamped() {
	let registry = TaskRegistry::new();
	let task = registry.register(io_spec("clamp"));
	task.set_progress(7.0);
	assert_eq!(registry.get(task.id()).map(|t| t.progress), Some(1.0));
	task.set_progress(-1.0);
	assert_eq!(registry.get(task.id()).map(|t| t.progress), Some(0.0));
}

#[test]
fn non_recoverable_flag_only_counts_running_tasks() {
	let registry = TaskRegistry::new();
	let save = registry.register(io_spec("save").non_recoverable());
	let _index = registry.register(TaskSpec::new("index", TaskClass::CpuBlocking));
	assert!(registry.any_non_recoverable_running());

	save.finish(TaskState::Succeeded);
	assert!(!registry.any_non_recoverable_running());
	assert!(registry.any_running());
}

#[test]
fn terminal_state_is_set_once() {
	let registry = TaskRegistry::new();
	let task = registry.register(io_spec("once"));
	assert!(registry.cancel(task.id()));
	assert!(task.is_cancelled());
	assert!(!task.finish(TaskState::Succeeded));
	assert_eq!(registry.get(task.id()).map(|t| t.state), Some(TaskState::Cancelled));
	assert!(!registry.cancel(task.id()));
}

#[test]
fn finished_records_stay_until_pruned() {
	let registry = TaskRegistry::new();
	let done = registry.register(io_spec("done"));
	let running = registry.register(io_spec("running"));
	done.finish(TaskState::Succeeded);

	assert_eq!(registry.tasks().len(), 2);
	assert_eq!(registry.running().len(), 1);

	assert!(!registry.remove(running.id()), "running tasks cannot be removed");
	assert_eq!(registry.prune_finished(), 1);
	assert_eq!(registry.tasks().len(), 1);
	assert_eq!(registry.tasks()[0].id, running.id());
}

#[test]
fn every_change_bumps_the_revision() {
	let registry = TaskRegistry::new();
	let rx = registry.subscribe();
	let start = *rx.borrow();

	let task = registry.register(io_spec("observed"));
	task.set_progress(0.5);
	task.finish(TaskState::Succeeded);

	assert_eq!(*rx.borrow(), start + 3);
}

#[tokio::test]
async fn spawn_tracked_records_success() {
	let registry = TaskRegistry::new();
	let task = registry.spawn_tracked(TaskSpec::new("ok", TaskClass::Background), |progress| async move {
		progress.set_progress(0.5);
		Ok::<_, String>(7)
	});

	match task.handle.await.expect("task joins") {
		TaskOutcome::Finished(Ok(value)) => assert_eq!(value, 7),
		other => panic!("unexpected outcome: {other:?}"),
	}
	let record = registry.get(task.id).expect("record kept");
	assert_eq!(record.state, TaskState::Succeeded);
	assert_eq!(record.progress, 1.0);
}

#[tokio::test]
async fn spawn_tracked_records_failure_message() {
	let registry = TaskRegistry::new();
	let task = registry.spawn_tracked(TaskSpec::new("bad", TaskClass::Background), |_| async move { Err::<(), _>("parse error at line 3") });

	assert!(matches!(task.handle.await.expect("task joins"), TaskOutcome::Finished(Err(_))));
	assert_eq!(registry.get(task.id).map(|t| t.state), Some(TaskState::Failed("parse error at line 3".into())));
}

#[tokio::test]
async fn spawn_tracked_honors_cancellation() {
	let registry = TaskRegistry::new();
	let task = registry.spawn_tracked(TaskSpec::new("slow", TaskClass::Background), |_| async move {
		tokio::time::sleep(Duration::from_secs(3600)).await;
		Ok::<_, String>(())
	});

	assert!(registry.cancel(task.id));
	assert!(matches!(task.handle.await.expect("task joins"), TaskOutcome::Cancelled));
	assert_eq!(registry.get(task.id).map(|t| t.state), Some(TaskState::Cancelled));
	assert!(!registry.any_running());
}

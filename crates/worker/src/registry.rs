//! Background task registry.
//!
//! Tracks every in-flight asynchronous operation together with its progress
//! and cancellation handle, so a UI can show what is running and decide
//! whether a window may close.
//!
//! # Invariants
//!
//! * Records are kept newest-first.
//! * A record leaves [`TaskState::Running`] at most once; later completions
//!   (for example a success racing a cancel) are ignored.
//! * Nothing is evicted automatically. Finished records stay visible until a
//!   consumer calls [`TaskRegistry::prune_finished`] or [`TaskRegistry::remove`].
//! * Every mutation bumps the revision published by [`TaskRegistry::subscribe`].

#[cfg(test)]
mod tests;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{TaskClass, spawn};

/// Identifier of one registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "task{}", self.0)
	}
}

/// Lifecycle state of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
	Running,
	Succeeded,
	Failed(String),
	Cancelled,
}

impl TaskState {
	pub fn is_running(&self) -> bool {
		matches!(self, Self::Running)
	}
}

/// Submission parameters for a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
	pub title: String,
	pub class: TaskClass,
	/// Whether the application may close while this task is still running.
	pub recoverable: bool,
}

impl TaskSpec {
	/// Creates a recoverable task spec.
	pub fn new(title: impl Into<String>, class: TaskClass) -> Self {
		Self {
			title: title.into(),
			class,
			recoverable: true,
		}
	}

	/// Marks the task as one that must finish before the window closes.
	#[must_use]
	pub fn non_recoverable(mut self) -> Self {
		self.recoverable = false;
		self
	}
}

/// Snapshot of one registered task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
	pub id: TaskId,
	pub title: String,
	pub class: TaskClass,
	pub recoverable: bool,
	pub state: TaskState,
	/// Fraction done, in `0.0..=1.0`.
	pub progress: f64,
}

struct TaskEntry {
	record: TaskRecord,
	cancel: CancellationToken,
}

struct RegistryInner {
	entries: RwLock<Vec<TaskEntry>>,
	next_id: AtomicU64,
	revision: watch::Sender<u64>,
}

/// Shared registry of background tasks.
///
/// Cheap to clone; clones observe the same records.
#[derive(Clone)]
pub struct TaskRegistry {
	inner: Arc<RegistryInner>,
}

impl fmt::Debug for TaskRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskRegistry").field("tasks", &self.inner.entries.read().len()).finish()
	}
}

impl Default for TaskRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Outcome of a tracked task.
#[derive(Debug)]
pub enum TaskOutcome<T, E> {
	Finished(Result<T, E>),
	Cancelled,
}

/// Handle to a task spawned with [`TaskRegistry::spawn_tracked`].
#[derive(Debug)]
pub struct TrackedTask<T, E> {
	pub id: TaskId,
	pub cancel: CancellationToken,
	pub handle: JoinHandle<TaskOutcome<T, E>>,
}

impl TaskRegistry {
	pub fn new() -> Self {
		let (revision, _) = watch::channel(0);
		Self {
			inner: Arc::new(RegistryInner {
				entries: RwLock::new(Vec::new()),
				next_id: AtomicU64::new(1),
				revision,
			}),
		}
	}

	/// Registers a running task and returns its progress handle.
	pub fn register(&self, spec: TaskSpec) -> TaskProgress {
		let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
		let cancel = CancellationToken::new();
		tracing::debug!(task = %id, title = %spec.title, class = spec.class.as_str(), "task.register");
		self.inner.entries.write().insert(
			0,
			TaskEntry {
				record: TaskRecord {
					id,
					title: spec.title,
					class: spec.class,
					recoverable: spec.recoverable,
					state: TaskState::Running,
					progress: 0.0,
				},
				cancel: cancel.clone(),
			},
		);
		self.bump();
		TaskProgress {
			id,
			registry: self.clone(),
			cancel,
		}
	}

	/// Registers a task and runs `f` on the worker pool.
	///
	/// The record is completed from the future's result. Cancellation through
	/// the returned token (or [`TaskRegistry::cancel`]) drops the future at its
	/// next suspension point.
	pub fn spawn_tracked<F, Fut, T, E>(&self, spec: TaskSpec, f: F) -> TrackedTask<T, E>
	where
		F: FnOnce(TaskProgress) -> Fut,
		Fut: Future<Output = Result<T, E>> + Send + 'static,
		T: Send + 'static,
		E: fmt::Display + Send + 'static,
	{
		let class = spec.class;
		let progress = self.register(spec);
		let id = progress.id();
		let cancel = progress.cancel.clone();
		let fut = f(progress.clone());
		let handle = spawn(class, async move {
			tokio::select! {
				biased;
				_ = progress.cancelled() => {
					progress.finish(TaskState::Cancelled);
					TaskOutcome::Cancelled
				}
				result = fut => {
					let state = match &result {
						Ok(_) => TaskState::Succeeded,
						Err(err) => TaskState::Failed(err.to_string()),
					};
					progress.finish(state);
					TaskOutcome::Finished(result)
				}
			}
		});
		TrackedTask { id, cancel, handle }
	}

	/// Requests cancellation and marks the task cancelled.
	///
	/// Returns false if the task is unknown or already finished.
	pub fn cancel(&self, id: TaskId) -> bool {
		let token = {
			let entries = self.inner.entries.read();
			match entries.iter().find(|e| e.record.id == id) {
				Some(entry) if entry.record.state.is_running() => entry.cancel.clone(),
				_ => return false,
			}
		};
		token.cancel();
		self.finish(id, TaskState::Cancelled)
	}

	/// Moves a running task into a terminal state.
	///
	/// Returns false if the task is unknown or already finished.
	pub fn finish(&self, id: TaskId, state: TaskState) -> bool {
		let changed = {
			let mut entries = self.inner.entries.write();
			match entries.iter_mut().find(|e| e.record.id == id) {
				Some(entry) if entry.record.state.is_running() => {
					if matches!(state, TaskState::Succeeded) {
						entry.record.progress = 1.0;
					}
					tracing::debug!(task = %id, state = ?state, "task.finish");
					entry.record.state = state;
					true
				}
				_ => false,
			}
		};
		if changed {
			self.bump();
		}
		changed
	}

	fn set_progress(&self, id: TaskId, progress: f64) {
		let changed = {
			let mut entries = self.inner.entries.write();
			match entries.iter_mut().find(|e| e.record.id == id) {
				Some(entry) if entry.record.state.is_running() => {
					entry.record.progress = progress.clamp(0.0, 1.0);
					true
				}
				_ => false,
			}
		};
		if changed {
			self.bump();
		}
	}

	/// Returns one task snapshot.
	pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
		self.inner.entries.read().iter().find(|e| e.record.id == id).map(|e| e.record.clone())
	}

	/// Returns all task snapshots, newest first.
	pub fn tasks(&self) -> Vec<TaskRecord> {
		self.inner.entries.read().iter().map(|e| e.record.clone()).collect()
	}

	/// Returns running task snapshots, newest first.
	pub fn running(&self) -> Vec<TaskRecord> {
		self.inner
			.entries
			.read()
			.iter()
			.filter(|e| e.record.state.is_running())
			.map(|e| e.record.clone())
			.collect()
	}

	pub fn any_running(&self) -> bool {
		self.inner.entries.read().iter().any(|e| e.record.state.is_running())
	}

	/// Returns true while a task that must not be abandoned is still running.
	pub fn any_non_recoverable_running(&self) -> bool {
		self.inner
			.entries
			.read()
			.iter()
			.any(|e| e.record.state.is_running() && !e.record.recoverable)
	}

	/// Mean progress of running tasks; `1.0` when nothing is running.
	pub fn aggregate_progress(&self) -> f64 {
		let entries = self.inner.entries.read();
		let (sum, count) = entries
			.iter()
			.filter(|e| e.record.state.is_running())
			.fold((0.0, 0usize), |(sum, count), e| (sum + e.record.progress, count + 1));
		if count == 0 { 1.0 } else { sum / count as f64 }
	}

	/// Removes all finished records, returning how many were evicted.
	pub fn prune_finished(&self) -> usize {
		let removed = {
			let mut entries = self.inner.entries.write();
			let before = entries.len();
			entries.retain(|e| e.record.state.is_running());
			before - entries.len()
		};
		if removed > 0 {
			self.bump();
		}
		removed
	}

	/// Removes one finished record. Running tasks are kept.
	pub fn remove(&self, id: TaskId) -> bool {
		let removed = {
			let mut entries = self.inner.entries.write();
			let before = entries.len();
			entries.retain(|e| e.record.id != id || e.record.state.is_running());
			before != entries.len()
		};
		if removed {
			self.bump();
		}
		removed
	}

	/// Subscribes to the registry revision, bumped on every change.
	pub fn subscribe(&self) -> watch::Receiver<u64> {
		self.inner.revision.subscribe()
	}

	fn bump(&self) {
		self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
	}
}

/// Progress and cancellation handle given to the task body.
#[derive(Clone)]
pub struct TaskProgress {
	id: TaskId,
	registry: TaskRegistry,
	cancel: CancellationToken,
}

impl fmt::Debug for TaskProgress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TaskProgress").field("id", &self.id).finish()
	}
}

impl TaskProgress {
	pub fn id(&self) -> TaskId {
		self.id
	}

	/// Reports progress as a fraction; values are clamped to `0.0..=1.0`.
	pub fn set_progress(&self, fraction: f64) {
		self.registry.set_progress(self.id, fraction);
	}

	/// Reports progress as `done` out of `total` units.
	pub fn set_work(&self, done: usize, total: usize) {
		let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
		self.set_progress(fraction);
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}

	/// Moves the task into a terminal state.
	pub fn finish(&self, state: TaskState) -> bool {
		self.registry.finish(self.id, state)
	}
}

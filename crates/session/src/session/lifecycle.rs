//! Loading, service attachment, and saving.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use shelf_primitives::{DocumentContext, Location, SourceLocation};
use shelf_worker::{TaskClass, TaskId, TaskOutcome, TaskSpec, TaskState, TrackedTask, join_error_message};
use tracing::{debug, info, trace, warn};

use super::{PendingLoad, Session, SessionState};
use crate::change_tracker::ChangeTracker;
use crate::error::{LoadError, Result, SaveError, SessionError};
use crate::events::SessionEvent;
use crate::msg::{LoadMsg, SaveMsg};
use crate::services::{DocumentWriter, LoadedDocument, Notification};

impl Session {
	/// Starts loading `source` on the worker pool.
	///
	/// The library becomes [`SessionState::Ready`] once the completion message
	/// is processed.
	pub fn begin_load(&mut self, source: SourceLocation) -> Result<TaskId> {
		if self.state != SessionState::Uninitialized {
			return Err(SessionError::InvalidState {
				op: "load",
				state: self.state,
			});
		}

		self.context = DocumentContext::placeholder();
		let generation = self.generations.next();
		let title = format!("Loading {}", source.path.display());
		info!(path = %source.path.display(), location = ?source.location, generation, "session.load");

		let loader = Arc::clone(&self.services.loader);
		let TrackedTask { id, handle, .. } = self.tasks.spawn_tracked(TaskSpec::new(title, TaskClass::IoBlocking), move |progress| async move {
			loader.load(&source, &progress).await
		});

		let tx = self.msg_tx.clone();
		let tasks = self.tasks.clone();
		shelf_worker::spawn(TaskClass::Background, async move {
			let msg = match handle.await {
				Ok(TaskOutcome::Finished(Ok(document))) => LoadMsg::Loaded {
					generation,
					document: Box::new(document),
				},
				Ok(TaskOutcome::Finished(Err(error))) => LoadMsg::Failed { generation, error },
				Ok(TaskOutcome::Cancelled) => LoadMsg::Cancelled { generation },
				Err(err) => {
					let message = join_error_message(err);
					tasks.finish(id, TaskState::Failed(message.clone()));
					LoadMsg::Failed {
						generation,
						error: LoadError::Worker(message),
					}
				}
			};
			let _ = tx.send(msg.into());
		});

		self.pending_load = Some(PendingLoad {
			generation,
			task: id,
		});
		self.set_state(SessionState::Loading);
		Ok(id)
	}

	/// Abandons the pending load and closes the session without starting
	/// any service.
	pub fn cancel_load(&mut self) -> Result<()> {
		if self.state != SessionState::Loading {
			return Err(SessionError::InvalidState {
				op: "cancel load",
				state: self.state,
			});
		}
		if let Some(pending) = self.pending_load.take() {
			info!(generation = pending.generation, task = %pending.task, "session.load.cancelled");
			self.tasks.cancel(pending.task);
		}
		self.context = DocumentContext::placeholder();
		self.set_state(SessionState::Closed);
		Ok(())
	}

	pub(crate) fn is_current_load(&self, generation: u64) -> bool {
		self.state == SessionState::Loading && self.pending_load.as_ref().is_some_and(|p| p.generation == generation)
	}

	pub(crate) fn apply_loaded(&mut self, document: LoadedDocument) {
		self.pending_load = None;
		let LoadedDocument { context, migrated, warnings } = document;
		info!(
			doc = %context.id(),
			path = ?context.backing_path(),
			records = context.len(),
			migrated,
			warnings = warnings.len(),
			"session.ready"
		);

		self.context = context;
		self.tracker = ChangeTracker::new();
		self.undo.clear();
		self.navigation.clear();
		self.selection.clear();

		if migrated {
			self.update_tracker(ChangeTracker::mark_non_undoable_changed);
		}
		for warning in warnings {
			self.notify(Notification::warning(warning));
		}

		self.attach_services();
		self.set_state(SessionState::Ready);
	}

	pub(crate) fn apply_load_failed(&mut self, error: LoadError) {
		self.pending_load = None;
		warn!(error = %error, "session.load.failed");
		self.context = DocumentContext::placeholder();
		self.set_state(SessionState::Uninitialized);
		self.notify(Notification::error(format!("Could not open library: {error}")));
	}

	/// The load task was cancelled through the registry rather than
	/// [`Session::cancel_load`].
	pub(crate) fn apply_load_cancelled(&mut self) {
		self.pending_load = None;
		info!("session.load.cancelled");
		self.context = DocumentContext::placeholder();
		self.set_state(SessionState::Closed);
	}

	/// Autosave runs for shared libraries, and for local ones when enabled.
	pub fn autosave_eligible(&self) -> bool {
		self.context.backing_path().is_some()
			&& match self.context.location {
				Location::Shared => true,
				Location::Local => self.preferences.autosave.enabled,
			}
	}

	pub fn backup_eligible(&self) -> bool {
		self.context.backing_path().is_some() && self.preferences.create_backups
	}

	fn attach_services(&mut self) {
		match self.services.index.open(&self.context) {
			Ok(()) => self.attached.index_open = true,
			Err(err) => {
				warn!(error = %err, "index.open failed");
				self.notify(Notification::warning(format!("Search index unavailable: {err}")));
			}
		}

		if self.autosave_eligible() {
			match self.services.autosave.start(&self.context, self.revision.subscribe(), self.msg_tx.clone()) {
				Ok(handle) => self.attached.autosave = Some(handle),
				Err(err) => warn!(error = %err, "autosave.start failed"),
			}
		}

		if self.backup_eligible() {
			let started = self.services.backup.start(
				self.msg_tx.clone(),
				&self.context,
				self.revision.subscribe(),
				&self.context.metadata,
				&self.preferences,
			);
			match started {
				Ok(handle) => self.attached.backup = Some(handle),
				Err(err) => warn!(error = %err, "backup.start failed"),
			}
		}

		if self.context.backing_path().is_some() {
			match self.services.monitor.register(&self.context, self.msg_tx.clone()) {
				Ok(handle) => self.attached.monitor = Some(handle),
				Err(err) => warn!(error = %err, "change monitor registration failed"),
			}
		}
		debug!(
			index = self.attached.index_open,
			autosave = self.attached.autosave.is_some(),
			backup = self.attached.backup.is_some(),
			monitor = self.attached.monitor.is_some(),
			"session.services.attached"
		);
	}

	/// Writes the library to its backing file on the calling context.
	pub fn save(&mut self) -> Result<()> {
		self.ensure_ready("save")?;
		let path = self.context.path.clone().ok_or(SaveError::NoPath)?;
		if write_unless_superseded(&self.written, &*self.services.writer, &self.context, &path, self.revision())? {
			info!(path = %path.display(), records = self.context.len(), "session.save");
			self.mark_saved();
		}
		Ok(())
	}

	/// Writes a snapshot of the library on the worker pool.
	///
	/// The session counts as saved only if nothing changed between the
	/// snapshot and the completion.
	pub fn save_in_background(&mut self) -> Result<TaskId> {
		self.ensure_ready("save")?;
		let path = self.context.path.clone().ok_or(SaveError::NoPath)?;
		let snapshot = self.context.clone();
		let revision = self.revision();
		let writer = Arc::clone(&self.services.writer);
		let written = Arc::clone(&self.written);

		let spec = TaskSpec::new(format!("Saving {}", self.context.title()), TaskClass::IoBlocking).non_recoverable();
		let TrackedTask { id, handle, .. } = self.tasks.spawn_tracked(spec, move |_progress| async move {
			match shelf_worker::spawn_blocking(TaskClass::IoBlocking, move || {
				write_unless_superseded(&written, &*writer, &snapshot, &path, revision).map(|_| ())
			})
			.await
			{
				Ok(result) => result,
				Err(err) => Err(SaveError::Worker(join_error_message(err))),
			}
		});
		debug!(task = %id, revision, "session.save.background");

		let tx = self.msg_tx.clone();
		let tasks = self.tasks.clone();
		shelf_worker::spawn(TaskClass::Background, async move {
			let result = match handle.await {
				Ok(TaskOutcome::Finished(result)) => result,
				Ok(TaskOutcome::Cancelled) => Err(SaveError::Worker("save cancelled".to_string())),
				Err(err) => {
					let message = join_error_message(err);
					tasks.finish(id, TaskState::Failed(message.clone()));
					Err(SaveError::Worker(message))
				}
			};
			let _ = tx.send(SaveMsg::Finished { revision, result }.into());
		});

		self.pending_save = Some(id);
		Ok(id)
	}

	pub(crate) fn apply_save_finished(&mut self, revision: u64, result: std::result::Result<(), SaveError>) {
		self.pending_save = None;
		if self.state != SessionState::Ready {
			debug!(state = %self.state, ok = result.is_ok(), "save finished after session left ready");
			return;
		}
		match result {
			Ok(()) if revision == self.revision() => {
				info!(revision, "session.save");
				self.mark_saved();
			}
			Ok(()) => {
				debug!(saved = revision, current = self.revision(), "library changed during save");
			}
			Err(err) => {
				warn!(error = %err, "background save failed");
				self.notify(Notification::error(format!("Could not save library: {err}")));
			}
		}
	}

	pub(crate) fn handle_autosave_request(&mut self) {
		if self.state != SessionState::Ready || !self.tracker.is_modified() {
			trace!(state = %self.state, "autosave request skipped");
			return;
		}
		if self.pending_save.is_some() {
			trace!("autosave request skipped, save in flight");
			return;
		}
		if let Err(err) = self.save_in_background() {
			warn!(error = %err, "autosave failed to start");
		}
	}

	pub(crate) fn apply_external_change(&mut self, path: PathBuf) {
		if self.state != SessionState::Ready {
			return;
		}
		info!(path = %path.display(), "session.external_change");
		self.emit(SessionEvent::ExternalChange(path));
		let title = self.context.title();
		self.notify(Notification::info(format!("The library '{title}' has been modified by another program.")));
	}

	/// Records a change that undo cannot reverse, such as a format migration.
	pub fn mark_non_undoable_changed(&mut self) -> Result<()> {
		self.ensure_ready("mark changed")?;
		self.update_tracker(ChangeTracker::mark_non_undoable_changed);
		self.bump_revision();
		Ok(())
	}

	/// Stops any background save from touching the backing file.
	///
	/// A write already in progress is waited for; later ones are skipped.
	pub(crate) fn seal_writes(&mut self) {
		if let Some(task) = self.pending_save.take() {
			debug!(task = %task, "session.save.abandoned");
			self.tasks.cancel(task);
		}
		*self.written.lock() = u64::MAX;
	}

	fn mark_saved(&mut self) {
		self.undo.mark_saved();
		self.update_tracker(ChangeTracker::reset_after_save);
		self.emit(SessionEvent::Saved);
	}
}

/// Writes `ctx` unless a newer revision already reached disk.
///
/// Returns false when the write was skipped.
fn write_unless_superseded(
	written: &Mutex<u64>,
	writer: &dyn DocumentWriter,
	ctx: &DocumentContext,
	path: &Path,
	revision: u64,
) -> std::result::Result<bool, SaveError> {
	let mut last = written.lock();
	if *last > revision {
		debug!(revision, written = *last, "session.save.superseded");
		return Ok(false);
	}
	writer.write(ctx, path)?;
	*last = revision;
	Ok(true)
}

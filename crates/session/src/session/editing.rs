//! Record edits and undo/redo.
//!
//! Every mutating operation here follows the same shape: change the context,
//! push exactly one undo unit, mark the tracker, forward the change to the
//! index, publish events, and bump the change revision.

use std::collections::HashSet;
use std::path::PathBuf;

use shelf_primitives::{FieldChange, Record, RecordId};
use tracing::{debug, warn};

use super::Session;
use crate::change_tracker::ChangeTracker;
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::services::{Notification, Prompt, PromptChoice};
use crate::undo::{ContextDelta, DeleteKind, UndoUnit};

impl Session {
	/// Inserts records at the end of the library.
	///
	/// Records are normalized first; a record whose ID is already taken gets
	/// a fresh one. The inserted records become the selection. Returns the
	/// IDs as stored.
	pub fn insert(&mut self, records: Vec<Record>) -> Result<Vec<RecordId>> {
		self.ensure_ready("insert")?;
		if records.is_empty() {
			return Ok(Vec::new());
		}
		let mut inserted = Vec::with_capacity(records.len());
		for record in records {
			let mut record = record.normalized();
			if self.context.contains(record.id()) {
				record = record.with_fresh_id();
			}
			let index = self.context.push(record.clone());
			inserted.push((index, record));
		}
		Ok(self.commit_insert(inserted))
	}

	/// Accepts records dragged in from another library.
	///
	/// Behaves like [`Session::insert`] except that every record gets a fresh
	/// ID, so the source library keeps its own.
	pub fn drop_accept(&mut self, records: Vec<Record>) -> Result<Vec<RecordId>> {
		self.ensure_ready("drop")?;
		self.insert(records.iter().map(Record::with_fresh_id).collect())
	}

	fn commit_insert(&mut self, inserted: Vec<(usize, Record)>) -> Vec<RecordId> {
		let ids: Vec<RecordId> = inserted.iter().map(|(_, record)| record.id()).collect();
		let records: Vec<Record> = inserted.iter().map(|(_, record)| record.clone()).collect();
		debug!(count = ids.len(), "session.insert");

		self.services.index.add_to_index(&records);
		self.undo.add_edit(UndoUnit::InsertRecords { records: inserted });
		self.update_tracker(ChangeTracker::mark_changed);
		self.emit(SessionEvent::RecordsInserted(ids.clone()));
		self.set_selection(ids.clone());
		self.bump_revision();
		ids
	}

	/// Removes records from the library.
	///
	/// Unknown IDs are ignored. A plain delete asks for confirmation when
	/// `confirm-delete` is set and afterwards removes linked files that no
	/// remaining record references. Returns the IDs actually removed.
	pub fn delete(&mut self, ids: &[RecordId], kind: DeleteKind) -> Result<Vec<RecordId>> {
		self.ensure_ready("delete")?;
		let present = self.present_ids(ids);
		if present.is_empty() {
			return Ok(Vec::new());
		}

		if kind == DeleteKind::Delete && self.preferences.confirm_delete {
			let prompt = Prompt::delete_records(present.len());
			let choice = self.services.dialogs.confirm(&prompt);
			if choice != PromptChoice::Confirm {
				debug!(count = present.len(), ?choice, "delete declined");
				return Err(SessionError::Aborted);
			}
		}

		let removed: Vec<(usize, Record)> = present.iter().filter_map(|id| self.context.remove(*id)).collect();
		let removed_ids: Vec<RecordId> = removed.iter().map(|(_, record)| record.id()).collect();
		debug!(count = removed_ids.len(), ?kind, "session.delete");

		self.services.index.remove_from_index(&removed_ids);
		if kind == DeleteKind::Delete {
			let orphaned = self.orphaned_files(removed.iter().map(|(_, record)| record));
			if !orphaned.is_empty() {
				if let Err(err) = self.services.cleaner.cleanup(&orphaned) {
					warn!(error = %err, files = orphaned.len(), "linked file cleanup failed");
					self.notify(Notification::warning(format!("Could not remove linked files: {err}")));
				}
			}
		}

		self.undo.add_edit(UndoUnit::RemoveRecords { records: removed, kind });
		self.update_tracker(ChangeTracker::mark_changed);
		self.emit(SessionEvent::RecordsRemoved(removed_ids.clone()));
		self.drop_from_selection(&removed_ids);
		self.bump_revision();
		Ok(removed_ids)
	}

	/// Sets or clears one field. Returns false when the value is unchanged.
	pub fn set_field(&mut self, id: RecordId, field: &str, value: Option<String>) -> Result<bool> {
		self.ensure_ready("edit")?;
		let Some(change) = self.field_change(id, field, value)? else {
			return Ok(false);
		};
		self.context.apply_field_change(&change);
		self.services.index.update_entry(&change);
		self.undo.add_edit(UndoUnit::ChangeField(change.clone()));
		self.commit_field_changes(vec![change]);
		Ok(true)
	}

	/// Applies several field edits to one record as a single undo step.
	///
	/// Returns the number of fields that actually changed.
	pub fn set_fields(&mut self, id: RecordId, changes: Vec<(String, Option<String>)>) -> Result<usize> {
		self.ensure_ready("edit")?;
		if !self.context.contains(id) {
			return Err(SessionError::UnknownRecord(id));
		}

		let mut applied = Vec::new();
		for (field, value) in changes {
			if let Some(change) = self.field_change(id, &field, value)? {
				self.context.apply_field_change(&change);
				self.services.index.update_entry(&change);
				applied.push(change);
			}
		}
		if applied.is_empty() {
			return Ok(0);
		}

		let units = applied.iter().cloned().map(UndoUnit::ChangeField).collect();
		self.undo.add_edit(UndoUnit::Compound {
			label: "edit entry".to_string(),
			units,
		});
		let count = applied.len();
		self.commit_field_changes(applied);
		Ok(count)
	}

	fn field_change(&self, id: RecordId, field: &str, value: Option<String>) -> Result<Option<FieldChange>> {
		let record = self.context.get(id).ok_or(SessionError::UnknownRecord(id))?;
		let field = field.trim().to_lowercase();
		let new = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
		let change = FieldChange {
			record: id,
			old: record.get(&field).map(str::to_string),
			field,
			new,
		};
		Ok((!change.is_noop()).then_some(change))
	}

	fn commit_field_changes(&mut self, changes: Vec<FieldChange>) {
		debug!(count = changes.len(), "session.set_field");
		self.update_tracker(ChangeTracker::mark_changed);
		for change in changes {
			self.emit(SessionEvent::FieldChanged(change));
		}
		self.bump_revision();
	}

	/// Reverses the last edit. Returns false when there is nothing to undo.
	pub fn undo(&mut self) -> Result<bool> {
		self.ensure_ready("undo")?;
		let Some(deltas) = self.undo.undo(&mut self.context) else {
			return Ok(false);
		};
		self.publish_deltas(deltas);
		self.sync_tracker_with_log();
		self.bump_revision();
		Ok(true)
	}

	/// Re-applies the last undone edit. Returns false when there is nothing
	/// to redo.
	pub fn redo(&mut self) -> Result<bool> {
		self.ensure_ready("redo")?;
		let Some(deltas) = self.undo.redo(&mut self.context) else {
			return Ok(false);
		};
		self.publish_deltas(deltas);
		self.sync_tracker_with_log();
		self.bump_revision();
		Ok(true)
	}

	/// Forwards replayed changes to the index and event subscribers.
	pub(super) fn publish_deltas(&mut self, deltas: Vec<ContextDelta>) {
		for delta in deltas {
			match delta {
				ContextDelta::Added(records) => {
					self.services.index.add_to_index(&records);
					self.emit(SessionEvent::RecordsInserted(records.iter().map(Record::id).collect()));
				}
				ContextDelta::Removed(ids) => {
					self.services.index.remove_from_index(&ids);
					self.emit(SessionEvent::RecordsRemoved(ids.clone()));
					self.drop_from_selection(&ids);
				}
				ContextDelta::FieldChanged(change) => {
					self.services.index.update_entry(&change);
					self.emit(SessionEvent::FieldChanged(change));
				}
			}
		}
	}

	fn sync_tracker_with_log(&mut self) {
		let pending = self.undo.has_pending_edits();
		self.update_tracker(|tracker| {
			if pending {
				tracker.mark_changed();
			} else {
				tracker.recompute(false);
			}
		});
	}

	/// Known IDs from `ids`, deduplicated, in the given order.
	pub(super) fn present_ids(&self, ids: &[RecordId]) -> Vec<RecordId> {
		let mut seen = HashSet::new();
		ids.iter().copied().filter(|id| self.context.contains(*id) && seen.insert(*id)).collect()
	}

	fn drop_from_selection(&mut self, removed: &[RecordId]) {
		let remaining: Vec<RecordId> = self.selection.iter().copied().filter(|id| !removed.contains(id)).collect();
		self.set_selection(remaining);
	}

	/// Files linked by `removed` that no record left in the library links.
	fn orphaned_files<'a>(&self, removed: impl Iterator<Item = &'a Record>) -> Vec<PathBuf> {
		let still_linked: HashSet<PathBuf> = self.context.records().iter().flat_map(Record::linked_files).collect();
		let mut seen = HashSet::new();
		removed
			.flat_map(Record::linked_files)
			.filter(|file| !still_linked.contains(file) && seen.insert(file.clone()))
			.collect()
	}
}

//! Copy, cut, and paste.

use std::collections::HashSet;

use shelf_primitives::{Record, RecordId};
use tracing::{debug, warn};

use super::Session;
use crate::error::{Result, SessionError};
use crate::services::Notification;
use crate::undo::DeleteKind;

/// What a paste did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteReport {
	pub inserted: Vec<RecordId>,
	/// Parsed records left out because they were empty or already present.
	pub skipped: usize,
}

impl Session {
	/// Writes the given records to the clipboard.
	///
	/// Records without fields have no text form and are not copied. Returns
	/// the IDs that were copied.
	pub fn copy(&mut self, ids: &[RecordId]) -> Result<Vec<RecordId>> {
		self.ensure_ready("copy")?;
		let records: Vec<Record> = self
			.present_ids(ids)
			.into_iter()
			.filter_map(|id| self.context.get(id))
			.filter(|record| !record.is_empty())
			.cloned()
			.collect();
		if records.is_empty() {
			return Ok(Vec::new());
		}

		let text = self.services.codec.serialize(&records);
		self.services.clipboard.set_contents(text)?;
		debug!(count = records.len(), "session.copy");
		Ok(records.iter().map(Record::id).collect())
	}

	/// Copies the records, then removes them as one undo step.
	///
	/// If the copied and removed sets differ the removal is undone and
	/// forgotten, the clipboard is cleared, and the session is left exactly
	/// as it was before the call.
	pub fn cut(&mut self, ids: &[RecordId]) -> Result<Vec<RecordId>> {
		self.ensure_ready("cut")?;
		let tracker = self.tracker;
		let selection = self.selection.clone();
		let redo = self.undo.take_redo();

		let copied = match self.copy(ids) {
			Ok(copied) => copied,
			Err(err) => {
				self.undo.restore_redo(redo);
				return Err(err);
			}
		};
		let removed = match self.delete(ids, DeleteKind::Cut) {
			Ok(removed) => removed,
			Err(err) => {
				self.undo.restore_redo(redo);
				return Err(err);
			}
		};

		let copied_set: HashSet<RecordId> = copied.iter().copied().collect();
		let removed_set: HashSet<RecordId> = removed.iter().copied().collect();
		let matched = copied_set == removed_set;
		if removed.is_empty() {
			self.undo.restore_redo(redo);
		} else if !matched {
			warn!(copied = copied.len(), removed = removed.len(), "cut mismatch, rolling back");
			if let Some(deltas) = self.undo.discard_last(&mut self.context) {
				self.publish_deltas(deltas);
			}
			self.undo.restore_redo(redo);
			self.bump_revision();
		}
		if matched {
			return Ok(removed);
		}

		self.update_tracker(|current| *current = tracker);
		self.set_selection(selection);
		self.services.clipboard.clear();
		Err(SessionError::CutRolledBack {
			copied: copied.len(),
			removed: removed.len(),
		})
	}

	/// Inserts records parsed from `content`.
	///
	/// The record codec is tried first; if it finds nothing the text is
	/// handed to the identifier importer. Empty records and records equal to
	/// one already in the library are skipped.
	pub fn paste(&mut self, content: &str) -> Result<PasteReport> {
		self.ensure_ready("paste")?;
		let mut parsed = self.services.codec.parse(content);
		if parsed.is_empty() {
			parsed = self.services.importer.import(content);
		}
		if parsed.is_empty() {
			debug!("paste found no records");
			return Ok(PasteReport::default());
		}

		let mut accepted: Vec<Record> = Vec::with_capacity(parsed.len());
		let mut skipped = 0;
		for record in parsed {
			let record = record.normalized();
			let duplicate = self.context.records().iter().chain(&accepted).any(|existing| existing.same_content(&record));
			if record.is_empty() || duplicate {
				skipped += 1;
			} else {
				accepted.push(record);
			}
		}

		let inserted = self.insert(accepted)?;
		let message = match skipped {
			0 => format!("Pasted {}", entries(inserted.len())),
			_ => format!("Pasted {}, skipped {skipped}", entries(inserted.len())),
		};
		self.notify(Notification::info(message));
		Ok(PasteReport { inserted, skipped })
	}

	/// Pastes whatever the clipboard holds.
	pub fn paste_from_clipboard(&mut self) -> Result<PasteReport> {
		self.ensure_ready("paste")?;
		match self.services.clipboard.contents()? {
			Some(text) => self.paste(&text),
			None => Ok(PasteReport::default()),
		}
	}
}

fn entries(count: usize) -> String {
	if count == 1 { "1 entry".to_string() } else { format!("{count} entries") }
}

//! Command-pattern undo log.
//!
//! Every mutating session operation produces one [`UndoUnit`] that carries
//! enough data to reverse itself. Undo and redo replay units against the
//! document context, so history is a pure function of the log.
//!
//! # Unsaved edit counting
//!
//! The log counts edits relative to the last save point: adding or redoing a
//! unit increments the count, undoing decrements it, and [`UndoLog::mark_saved`]
//! resets it. The count may go negative (undoing past the save point), which
//! also means the library differs from what is on disk.

mod unit;

use shelf_primitives::DocumentContext;
use tracing::trace;
pub use unit::{ContextDelta, DeleteKind, UndoUnit};

/// Maximum number of undo units kept.
pub const MAX_UNDO: usize = 100;

#[derive(Debug, Default)]
pub struct UndoLog {
	undo_stack: Vec<UndoUnit>,
	redo_stack: Vec<UndoUnit>,
	unsaved_edits: i64,
}

impl UndoLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn undo_len(&self) -> usize {
		self.undo_stack.len()
	}

	pub fn redo_len(&self) -> usize {
		self.redo_stack.len()
	}

	pub fn can_undo(&self) -> bool {
		!self.undo_stack.is_empty()
	}

	pub fn can_redo(&self) -> bool {
		!self.redo_stack.is_empty()
	}

	/// Returns the unit `undo` would reverse next.
	pub fn last(&self) -> Option<&UndoUnit> {
		self.undo_stack.last()
	}

	/// Returns true when the library differs from the last save point.
	pub fn has_pending_edits(&self) -> bool {
		self.unsaved_edits != 0
	}

	/// Appends an already-applied unit and clears the redo stack.
	pub fn add_edit(&mut self, unit: UndoUnit) {
		trace!(label = %unit.label(), undo_stack = self.undo_stack.len() + 1, "undo unit pushed");
		self.undo_stack.push(unit);
		if !self.redo_stack.is_empty() {
			trace!(cleared = self.redo_stack.len(), "redo stack cleared");
		}
		self.redo_stack.clear();
		self.unsaved_edits += 1;

		if self.undo_stack.len() > MAX_UNDO {
			self.undo_stack.remove(0);
		}
	}

	/// Reverses the most recent unit.
	pub fn undo(&mut self, ctx: &mut DocumentContext) -> Option<Vec<ContextDelta>> {
		let unit = self.undo_stack.pop()?;
		let deltas = unit.revert(ctx);
		trace!(label = %unit.label(), "undo");
		self.redo_stack.push(unit);
		self.unsaved_edits -= 1;
		Some(deltas)
	}

	/// Re-applies the most recently undone unit.
	pub fn redo(&mut self, ctx: &mut DocumentContext) -> Option<Vec<ContextDelta>> {
		let unit = self.redo_stack.pop()?;
		let deltas = unit.reapply(ctx);
		trace!(label = %unit.label(), "redo");
		self.undo_stack.push(unit);
		self.unsaved_edits += 1;
		Some(deltas)
	}

	/// Reverses the most recent unit and forgets it entirely.
	///
	/// Used to roll back a partially failed operation; the unit does not
	/// become redoable.
	pub fn discard_last(&mut self, ctx: &mut DocumentContext) -> Option<Vec<ContextDelta>> {
		let unit = self.undo_stack.pop()?;
		trace!(label = %unit.label(), "undo unit rolled back");
		self.unsaved_edits -= 1;
		Some(unit.revert(ctx))
	}

	/// Takes the redo stack, leaving it empty.
	pub fn take_redo(&mut self) -> Vec<UndoUnit> {
		std::mem::take(&mut self.redo_stack)
	}

	/// Replaces the redo stack.
	pub fn restore_redo(&mut self, units: Vec<UndoUnit>) {
		self.redo_stack = units;
	}

	/// Marks the current position as the save point.
	pub fn mark_saved(&mut self) {
		self.unsaved_edits = 0;
	}

	/// Drops all history.
	pub fn clear(&mut self) {
		self.undo_stack.clear();
		self.redo_stack.clear();
		self.unsaved_edits = 0;
	}
}

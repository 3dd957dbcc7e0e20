//! Unsaved-change tracking.
//!
//! Two flags decide whether closing a library needs a save prompt:
//!
//! * `modified` - any edit since the last successful save.
//! * `non_undoable_modified` - an edit that undo cannot reverse (for example
//!   a format migration applied while loading).
//!
//! Undoing back to the save point clears `modified`, unless a non-undoable
//! change pins it.
//!
//! # Invariants
//!
//! * `non_undoable_modified` implies `modified`.
//! * `modified` is only cleared while `non_undoable_modified` is false, or by
//!   [`ChangeTracker::reset_after_save`].

/// Modified / non-undoable-modified flag pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTracker {
	modified: bool,
	non_undoable_modified: bool,
}

impl ChangeTracker {
	pub fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub fn is_modified(&self) -> bool {
		self.modified
	}

	#[inline]
	pub fn is_non_undoable_modified(&self) -> bool {
		self.non_undoable_modified
	}

	/// Records an undoable edit.
	pub fn mark_changed(&mut self) {
		self.modified = true;
	}

	/// Records an edit that cannot be undone.
	pub fn mark_non_undoable_changed(&mut self) {
		self.modified = true;
		self.non_undoable_modified = true;
	}

	/// Re-derives `modified` after the undo log moved.
	///
	/// Clears `modified` only when the log has no pending edits and no
	/// non-undoable change occurred; otherwise leaves both flags untouched.
	pub fn recompute(&mut self, undo_log_has_pending_edits: bool) {
		if !undo_log_has_pending_edits && !self.non_undoable_modified {
			self.modified = false;
		}
	}

	/// Clears both flags after a successful save.
	pub fn reset_after_save(&mut self) {
		self.modified = false;
		self.non_undoable_modified = false;
	}
}

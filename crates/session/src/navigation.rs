//! Back/forward history of inspected records.
//!
//! Entries are [`RecordId`]s, never records: a record can be deleted while the
//! history still mentions it, and the session prunes such entries before
//! navigating.
//!
//! # Invariants
//!
//! * `previous`, `next` and `current` are pairwise disjoint.
//! * [`NavigationHistory::add`] clears `next`.
//! * Each stack holds at most [`MAX_HISTORY`] entries; the oldest is dropped.


use shelf_primitives::RecordId;

/// Maximum number of entries remembered in each direction.
pub const MAX_HISTORY: usize = 100;

/// Two bounded stacks around a current pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationHistory {
	/// Older entries; the top (last) is the one `back` returns.
	previous: Vec<RecordId>,
	/// Newer entries; the top (last) is the one `forward` returns.
	next: Vec<RecordId>,
	current: Option<RecordId>,
}

impl NavigationHistory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn current(&self) -> Option<RecordId> {
		self.current
	}

	/// Entries reachable with `back`, oldest first.
	pub fn previous(&self) -> &[RecordId] {
		&self.previous
	}

	/// Entries reachable with `forward`, furthest first.
	pub fn next(&self) -> &[RecordId] {
		&self.next
	}

	/// Records `id` as the new current entry.
	///
	/// No-op when `id` already is current.
	pub fn add(&mut self, id: RecordId) {
		if self.current == Some(id) {
			return;
		}
		self.next.clear();
		self.previous.retain(|entry| *entry != id);
		if let Some(old) = self.current.replace(id) {
			push_bounded(&mut self.previous, old);
		}
	}

	/// Steps back, returning the new current entry.
	pub fn back(&mut self) -> Option<RecordId> {
		let target = self.previous.pop()?;
		if let Some(old) = self.current.replace(target) {
			push_bounded(&mut self.next, old);
		}
		Some(target)
	}

	/// Steps forward, returning the new current entry.
	pub fn forward(&mut self) -> Option<RecordId> {
		let target = self.next.pop()?;
		if let Some(old) = self.current.replace(target) {
			push_bounded(&mut self.previous, old);
		}
		Some(target)
	}

	pub fn can_go_back(&self) -> bool {
		!self.previous.is_empty()
	}

	pub fn can_go_forward(&self) -> bool {
		!self.next.is_empty()
	}

	/// Drops every entry for which `keep` returns false.
	///
	/// A dropped current entry leaves the history without a current pointer.
	pub fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
		self.previous.retain(|id| keep(*id));
		self.next.retain(|id| keep(*id));
		if self.current.is_some_and(|id| !keep(id)) {
			self.current = None;
		}
	}

	pub fn clear(&mut self) {
		self.previous.clear();
		self.next.clear();
		self.current = None;
	}
}

fn push_bounded(stack: &mut Vec<RecordId>, id: RecordId) {
	stack.push(id);
	if stack.len() > MAX_HISTORY {
		stack.remove(0);
	}
}

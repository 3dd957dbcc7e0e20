//! Selection and back/forward navigation.

use shelf_primitives::RecordId;

use super::Session;
use crate::error::Result;

impl Session {
	/// Selects records. The first one becomes the newest navigation entry.
	///
	/// Unknown IDs are dropped from the selection.
	pub fn select(&mut self, ids: &[RecordId]) -> Result<()> {
		self.ensure_ready("select")?;
		let ids = self.present_ids(ids);
		if let Some(first) = ids.first() {
			self.navigation.add(*first);
		}
		self.set_selection(ids);
		Ok(())
	}

	/// Selects the previously inspected record that still exists.
	pub fn back(&mut self) -> Result<Option<RecordId>> {
		self.ensure_ready("go back")?;
		self.prune_navigation();
		let target = self.navigation.back();
		if let Some(id) = target {
			self.set_selection(vec![id]);
		}
		Ok(target)
	}

	/// Selects the next record in history that still exists.
	pub fn forward(&mut self) -> Result<Option<RecordId>> {
		self.ensure_ready("go forward")?;
		self.prune_navigation();
		let target = self.navigation.forward();
		if let Some(id) = target {
			self.set_selection(vec![id]);
		}
		Ok(target)
	}

	pub fn can_go_back(&self) -> bool {
		self.navigation.previous().iter().any(|id| self.context.contains(*id))
	}

	pub fn can_go_forward(&self) -> bool {
		self.navigation.next().iter().any(|id| self.context.contains(*id))
	}

	fn prune_navigation(&mut self) {
		let context = &self.context;
		self.navigation.retain(|id| context.contains(id));
	}
}

//! Load completion messages.

use crate::Session;
use crate::error::LoadError;
use crate::services::LoadedDocument;

/// Outcome of a load task, tagged with the generation that started it.
#[derive(Debug)]
pub enum LoadMsg {
	Loaded { generation: u64, document: Box<LoadedDocument> },
	Failed { generation: u64, error: LoadError },
	Cancelled { generation: u64 },
}

impl LoadMsg {
	pub fn generation(&self) -> u64 {
		match self {
			Self::Loaded { generation, .. } | Self::Failed { generation, .. } | Self::Cancelled { generation } => *generation,
		}
	}

	pub fn apply(self, session: &mut Session) {
		if !session.is_current_load(self.generation()) {
			tracing::debug!(generation = self.generation(), "session.load.stale");
			return;
		}
		match self {
			Self::Loaded { document, .. } => session.apply_loaded(*document),
			Self::Failed { error, .. } => session.apply_load_failed(error),
			Self::Cancelled { .. } => session.apply_load_cancelled(),
		}
	}
}

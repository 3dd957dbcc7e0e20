//! Background save completion.

use crate::Session;
use crate::error::SaveError;

#[derive(Debug)]
pub enum SaveMsg {
	/// A background save finished. `revision` is the change revision the
	/// written snapshot was taken at.
	Finished { revision: u64, result: Result<(), SaveError> },
}

impl SaveMsg {
	pub fn apply(self, session: &mut Session) {
		match self {
			Self::Finished { revision, result } => session.apply_save_finished(revision, result),
		}
	}
}

use std::path::PathBuf;

use crate::Session;

/// Messages from the external change monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMsg {
	/// The backing file was modified by another program.
	ExternalChange { path: PathBuf },
}

impl MonitorMsg {
	pub fn apply(self, session: &mut Session) {
		match self {
			Self::ExternalChange { path } => session.apply_external_change(path),
		}
	}
}

//! Worker-to-session message channel.
//!
//! Background work never touches session state directly. Completions and
//! service notifications are sent as [`SessionMsg`] values and applied in
//! FIFO order when the owner drains the queue.
//!
//! ```text
//! load task ─────┐
//! save task ─────┤
//! autosave ──────┼──► SessionMsg ──► Session::drain_messages() ──► state update
//! change monitor ┘
//! ```

mod load;
mod monitor;
mod save;

pub use load::LoadMsg;
pub use monitor::MonitorMsg;
pub use save::SaveMsg;
use tokio::sync::mpsc;

use crate::Session;

/// Channel sender handed to workers and services.
pub type MsgSender = mpsc::UnboundedSender<SessionMsg>;

/// Channel receiver owned by the session.
pub type MsgReceiver = mpsc::UnboundedReceiver<SessionMsg>;

pub fn channel() -> (MsgSender, MsgReceiver) {
	mpsc::unbounded_channel()
}

#[derive(Debug)]
pub enum SessionMsg {
	Load(LoadMsg),
	Save(SaveMsg),
	Monitor(MonitorMsg),
	/// The autosave service decided the library should be written.
	AutosaveRequested,
}

impl SessionMsg {
	/// Shorthand for [`MonitorMsg::ExternalChange`].
	pub fn external_change(path: impl Into<std::path::PathBuf>) -> Self {
		Self::Monitor(MonitorMsg::ExternalChange { path: path.into() })
	}

	pub fn apply(self, session: &mut Session) {
		match self {
			Self::Load(msg) => msg.apply(session),
			Self::Save(msg) => msg.apply(session),
			Self::Monitor(msg) => msg.apply(session),
			Self::AutosaveRequested => session.handle_autosave_request(),
		}
	}
}

impl From<LoadMsg> for SessionMsg {
	fn from(msg: LoadMsg) -> Self {
		Self::Load(msg)
	}
}

impl From<SaveMsg> for SessionMsg {
	fn from(msg: SaveMsg) -> Self {
		Self::Save(msg)
	}
}

impl From<MonitorMsg> for SessionMsg {
	fn from(msg: MonitorMsg) -> Self {
		Self::Monitor(msg)
	}
}

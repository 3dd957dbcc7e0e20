//! Session controller for one open library.
//!
//! A [`Session`] owns the library's [`DocumentContext`] from the moment a load
//! completes until close, together with every service attached to it. All
//! methods take `&mut self` and run on whichever context owns the session;
//! background work reports back through the session's message queue and is
//! applied by [`Session::drain_messages`] or [`Session::process_next`].
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──begin_load──► Loading ──loaded──► Ready ──request_close──► Closing ──► Closed
//!       ▲                          │                  │ ▲
//!       └──────── load failed ─────┤                  └─┘ edits, undo/redo, save
//!                                  └── cancel_load ──────────────────────────────────► Closed
//! ```
//!
//! # Invariants
//!
//! * Edits are accepted only in [`SessionState::Ready`].
//! * Services are attached only after a successful load and are stopped
//!   exactly once, on close.
//! * A load completion from a superseded or cancelled load is ignored.
//! * Every mutation bumps the change revision watched by autosave and backup.
//! * `non_undoable_modified` implies `modified` on the tracker.
//! * Writes to the backing file are serialized, and a snapshot older than
//!   the last written revision never reaches disk.

mod clipboard;
mod close;
mod editing;
#[cfg(test)]
mod invariants;
mod lifecycle;
mod navigation;

use std::fmt;
use std::sync::Arc;

pub use clipboard::PasteReport;
pub use close::{CloseOutcome, CloseReport};
use parking_lot::Mutex;
use shelf_primitives::{DocumentContext, RecordId};
use shelf_worker::{GenerationClock, TaskId, TaskRegistry};
use tokio::sync::watch;

use crate::change_tracker::ChangeTracker;
use crate::config::SessionPreferences;
use crate::error::{Result, SessionError};
use crate::events::{EventDispatch, HandlerId, SessionEvent};
use crate::msg::{self, MsgReceiver, MsgSender};
use crate::navigation::NavigationHistory;
use crate::services::{Notification, ServiceHandle, SessionServices};
use crate::undo::UndoLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	Uninitialized,
	Loading,
	Ready,
	Closing,
	Closed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Uninitialized => "uninitialized",
			Self::Loading => "loading",
			Self::Ready => "ready",
			Self::Closing => "closing",
			Self::Closed => "closed",
		})
	}
}

/// The load currently in flight.
#[derive(Debug)]
struct PendingLoad {
	generation: u64,
	task: TaskId,
}

/// Handles of services started when the library became ready.
#[derive(Debug, Default)]
struct AttachedServices {
	index_open: bool,
	autosave: Option<ServiceHandle>,
	backup: Option<ServiceHandle>,
	monitor: Option<ServiceHandle>,
}

pub struct Session {
	state: SessionState,
	context: DocumentContext,
	services: SessionServices,
	preferences: SessionPreferences,
	tracker: ChangeTracker,
	undo: UndoLog,
	navigation: NavigationHistory,
	selection: Vec<RecordId>,
	tasks: TaskRegistry,
	generations: GenerationClock,
	pending_load: Option<PendingLoad>,
	pending_save: Option<TaskId>,
	/// Revision last written to disk; `u64::MAX` once closed.
	written: Arc<Mutex<u64>>,
	attached: AttachedServices,
	revision: watch::Sender<u64>,
	msg_tx: MsgSender,
	msg_rx: MsgReceiver,
	events: EventDispatch,
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("state", &self.state)
			.field("doc", &self.context.id())
			.field("records", &self.context.len())
			.field("tracker", &self.tracker)
			.finish_non_exhaustive()
	}
}

impl Session {
	/// Creates an uninitialized session with its own task registry.
	pub fn new(services: SessionServices, preferences: SessionPreferences) -> Self {
		Self::with_registry(services, preferences, TaskRegistry::new())
	}

	/// Creates an uninitialized session reporting background work to `tasks`.
	pub fn with_registry(services: SessionServices, preferences: SessionPreferences, tasks: TaskRegistry) -> Self {
		let (msg_tx, msg_rx) = msg::channel();
		let (revision, _) = watch::channel(0);
		Self {
			state: SessionState::Uninitialized,
			context: DocumentContext::placeholder(),
			services,
			preferences,
			tracker: ChangeTracker::new(),
			undo: UndoLog::new(),
			navigation: NavigationHistory::new(),
			selection: Vec::new(),
			tasks,
			generations: GenerationClock::new(),
			pending_load: None,
			pending_save: None,
			written: Arc::default(),
			attached: AttachedServices::default(),
			revision,
			msg_tx,
			msg_rx,
			events: EventDispatch::new(),
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	pub fn context(&self) -> &DocumentContext {
		&self.context
	}

	pub fn tracker(&self) -> &ChangeTracker {
		&self.tracker
	}

	pub fn undo_log(&self) -> &UndoLog {
		&self.undo
	}

	pub fn selection(&self) -> &[RecordId] {
		&self.selection
	}

	pub fn navigation(&self) -> &NavigationHistory {
		&self.navigation
	}

	pub fn tasks(&self) -> &TaskRegistry {
		&self.tasks
	}

	pub fn preferences(&self) -> &SessionPreferences {
		&self.preferences
	}

	/// Current change revision.
	pub fn revision(&self) -> u64 {
		*self.revision.borrow()
	}

	/// Sender for messages to this session. Services receive clones of it.
	pub fn sender(&self) -> MsgSender {
		self.msg_tx.clone()
	}

	pub fn subscribe(&mut self, handler: impl FnMut(&SessionEvent) + Send + 'static) -> HandlerId {
		self.events.subscribe(handler)
	}

	pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
		self.events.unsubscribe(id)
	}

	/// Applies every queued message without waiting. Returns how many ran.
	pub fn drain_messages(&mut self) -> usize {
		let mut applied = 0;
		while let Ok(msg) = self.msg_rx.try_recv() {
			msg.apply(self);
			applied += 1;
		}
		applied
	}

	/// Waits for the next message and applies it.
	pub async fn process_next(&mut self) {
		// The session holds a sender itself, so the channel never closes.
		if let Some(msg) = self.msg_rx.recv().await {
			msg.apply(self);
		}
	}

	/// Processes messages until the pending load resolves.
	pub async fn wait_until_loaded(&mut self) -> SessionState {
		while self.state == SessionState::Loading {
			self.process_next().await;
		}
		self.state
	}

	fn ensure_ready(&self, op: &'static str) -> Result<()> {
		if self.state == SessionState::Ready {
			Ok(())
		} else {
			Err(SessionError::NotReady { op, state: self.state })
		}
	}

	fn set_state(&mut self, to: SessionState) {
		let from = std::mem::replace(&mut self.state, to);
		if from != to {
			tracing::debug!(doc = %self.context.id(), %from, %to, "session.state");
			self.emit(SessionEvent::StateChanged { from, to });
		}
	}

	fn emit(&mut self, event: SessionEvent) {
		self.events.dispatch(&event);
	}

	fn notify(&mut self, notification: Notification) {
		self.services.dialogs.notify(notification);
	}

	fn bump_revision(&mut self) {
		self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
	}

	/// Applies `f` to the tracker, publishing a change of the modified flag.
	fn update_tracker(&mut self, f: impl FnOnce(&mut ChangeTracker)) {
		let before = self.tracker.is_modified();
		f(&mut self.tracker);
		let after = self.tracker.is_modified();
		if before != after {
			self.emit(SessionEvent::ModifiedChanged(after));
		}
	}

	fn set_selection(&mut self, ids: Vec<RecordId>) {
		if self.selection != ids {
			self.selection = ids;
			self.emit(SessionEvent::SelectionChanged(self.selection.clone()));
		}
	}
}

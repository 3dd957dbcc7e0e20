//! Typed session events.
//!
//! Handlers are invoked synchronously, in subscription order, after the
//! mutation that produced the event has been fully applied. A handler sees
//! the event only; it cannot reach back into the session while it runs.

use std::path::PathBuf;

use shelf_primitives::{FieldChange, RecordId};

use crate::SessionState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	StateChanged { from: SessionState, to: SessionState },
	RecordsInserted(Vec<RecordId>),
	RecordsRemoved(Vec<RecordId>),
	FieldChanged(FieldChange),
	SelectionChanged(Vec<RecordId>),
	ModifiedChanged(bool),
	ExternalChange(PathBuf),
	Saved,
}

/// Subscription key returned by [`EventDispatch::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&SessionEvent) + Send>;

/// Ordered list of event handlers.
#[derive(Default)]
pub struct EventDispatch {
	handlers: Vec<(HandlerId, Handler)>,
	next_id: u64,
}

impl std::fmt::Debug for EventDispatch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventDispatch").field("handlers", &self.handlers.len()).finish()
	}
}

impl EventDispatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&mut self, handler: impl FnMut(&SessionEvent) + Send + 'static) -> HandlerId {
		let id = HandlerId(self.next_id);
		self.next_id += 1;
		self.handlers.push((id, Box::new(handler)));
		id
	}

	/// Returns false if `id` was not subscribed.
	pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
		let before = self.handlers.len();
		self.handlers.retain(|(handler_id, _)| *handler_id != id);
		before != self.handlers.len()
	}

	pub fn dispatch(&mut self, event: &SessionEvent) {
		tracing::trace!(?event, handlers = self.handlers.len(), "session.event");
		for (_, handler) in &mut self.handlers {
			handler(event);
		}
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}
}

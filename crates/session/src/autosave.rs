//! Debounced autosave service.
//!
//! Watches the session's change revision and asks the session to save once
//! edits settle. A save is requested after `debounce` of quiet, or at the
//! latest `max_delay` after the first unsaved change when edits keep coming.
//! The service only requests; the session performs the write.

use std::time::Duration;

use shelf_primitives::DocumentContext;
use shelf_worker::TaskClass;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::AutosaveConfig;
use crate::error::ServiceError;
use crate::msg::{MsgSender, SessionMsg};
use crate::services::{AutosaveManager, ChangeSource, ServiceHandle};

#[derive(Debug, Clone)]
pub struct DebouncedAutosave {
	debounce: Duration,
	max_delay: Duration,
}

impl DebouncedAutosave {
	pub fn new(config: &AutosaveConfig) -> Self {
		Self {
			debounce: config.debounce(),
			max_delay: config.max_delay(),
		}
	}
}

impl AutosaveManager for DebouncedAutosave {
	fn start(&mut self, ctx: &DocumentContext, changes: ChangeSource, requests: MsgSender) -> Result<ServiceHandle, ServiceError> {
		let cancel = CancellationToken::new();
		debug!(doc = %ctx.id(), debounce_ms = self.debounce.as_millis() as u64, "autosave.start");
		let task = shelf_worker::spawn(
			TaskClass::Background,
			watch_changes(changes, requests, cancel.clone(), self.debounce, self.max_delay),
		);
		Ok(ServiceHandle::new("autosave", cancel).with_task(task))
	}

	fn shutdown(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
		handle.stop();
		Ok(())
	}
}

async fn watch_changes(mut changes: ChangeSource, requests: MsgSender, cancel: CancellationToken, debounce: Duration, max_delay: Duration) {
	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			changed = changes.changed() => if changed.is_err() { return },
		}

		let first = Instant::now();
		let mut last = first;
		loop {
			let deadline = (last + debounce).min(first + max_delay);
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return,
				_ = tokio::time::sleep_until(deadline) => break,
				changed = changes.changed() => {
					if changed.is_err() {
						return;
					}
					last = Instant::now();
				}
			}
		}

		trace!(waited_ms = first.elapsed().as_millis() as u64, "autosave.request");
		if requests.send(SessionMsg::AutosaveRequested).is_err() {
			return;
		}
	}
}

//! Save-before-close and service teardown.
//!
//! Teardown runs in a fixed order: change monitor, index, autosave, backup.
//! Each step is isolated; an error or panic in one service is recorded and
//! the remaining services are still stopped.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use shelf_primitives::{DocumentContext, Location};
use tracing::{info, warn};

use super::{AttachedServices, Session, SessionState};
use crate::error::{Result, ServiceError, ServiceKind, ServiceTeardownError, SessionError};
use crate::services::{Prompt, PromptChoice};

/// Result of [`Session::request_close`].
#[derive(Debug)]
pub enum CloseOutcome {
	Closed(CloseReport),
	/// The user chose to keep the library open.
	Cancelled,
}

impl CloseOutcome {
	pub fn is_closed(&self) -> bool {
		matches!(self, Self::Closed(_))
	}
}

#[derive(Debug, Default)]
pub struct CloseReport {
	/// Unsaved changes were thrown away.
	pub discarded: bool,
	/// Services that failed to stop cleanly, in teardown order.
	pub failures: Vec<ServiceTeardownError>,
}

impl CloseReport {
	pub fn is_clean(&self) -> bool {
		self.failures.is_empty()
	}
}

impl Session {
	/// Closes the library.
	///
	/// A modified local library prompts to save, discard, or cancel first; a
	/// failed save re-prompts with the error. Shared libraries close without
	/// asking. A pending load is cancelled.
	pub fn request_close(&mut self) -> Result<CloseOutcome> {
		match self.state {
			SessionState::Ready => {}
			SessionState::Uninitialized => {
				self.set_state(SessionState::Closed);
				return Ok(CloseOutcome::Closed(CloseReport::default()));
			}
			SessionState::Loading => {
				self.cancel_load()?;
				return Ok(CloseOutcome::Closed(CloseReport::default()));
			}
			SessionState::Closing | SessionState::Closed => {
				return Err(SessionError::InvalidState {
					op: "close",
					state: self.state,
				});
			}
		}

		let mut discard = false;
		if self.tracker.is_modified() && self.context.location == Location::Local {
			let mut save_error = None;
			loop {
				let prompt = Prompt::unsaved_changes(&self.context.title(), save_error.take());
				match self.services.dialogs.confirm(&prompt) {
					PromptChoice::Save => match self.save() {
						Ok(()) => break,
						Err(SessionError::Save(err)) => {
							warn!(error = %err, "save before close failed");
							save_error = Some(err.to_string());
						}
						Err(err) => return Err(err),
					},
					PromptChoice::Discard => {
						discard = true;
						break;
					}
					choice => {
						info!(?choice, "session.close.cancelled");
						return Ok(CloseOutcome::Cancelled);
					}
				}
			}
		}

		self.seal_writes();
		self.set_state(SessionState::Closing);
		info!(doc = %self.context.id(), discard, "session.close");
		let report = self.teardown(discard);
		self.context = DocumentContext::placeholder();
		self.undo.clear();
		self.navigation.clear();
		self.selection.clear();
		self.set_state(SessionState::Closed);
		Ok(CloseOutcome::Closed(report))
	}

	fn teardown(&mut self, discard: bool) -> CloseReport {
		let mut report = CloseReport {
			discarded: discard,
			failures: Vec::new(),
		};
		let AttachedServices {
			index_open,
			autosave,
			backup,
			monitor,
		} = std::mem::take(&mut self.attached);
		let services = &mut self.services;
		let ctx = &self.context;
		let backup_dir = self.preferences.backup_dir.as_path();

		if let Some(handle) = monitor {
			report.record(ServiceKind::ChangeMonitor, || services.monitor.unregister(handle));
		}
		if index_open {
			report.record(ServiceKind::Index, || services.index.close());
		}
		if let Some(handle) = autosave {
			report.record(ServiceKind::Autosave, || services.autosave.shutdown(handle));
		}
		if discard && backup.is_some() {
			report.record(ServiceKind::Backup, || services.backup.discard_backup(ctx, backup_dir));
		}
		if let Some(handle) = backup {
			report.record(ServiceKind::Backup, || services.backup.shutdown(handle, backup_dir, !discard));
		}
		report
	}
}

impl CloseReport {
	fn record(&mut self, service: ServiceKind, step: impl FnOnce() -> std::result::Result<(), ServiceError>) {
		let reason = match catch_unwind(AssertUnwindSafe(step)) {
			Ok(Ok(())) => return,
			Ok(Err(err)) => err.to_string(),
			Err(payload) => panic_message(payload),
		};
		let failure = ServiceTeardownError { service, reason };
		warn!(%service, error = %failure, "session.teardown");
		self.failures.push(failure);
	}
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		format!("panicked: {s}")
	} else if let Some(s) = payload.downcast_ref::<String>() {
		format!("panicked: {s}")
	} else {
		"panicked".to_string()
	}
}

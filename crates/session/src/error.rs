//! Session error taxonomy.
//!
//! Load and save failures are recoverable and surfaced to the user. Teardown
//! failures are logged and collected but never block a close. A declined
//! confirmation is reported as [`SessionError::Aborted`] and is not an error
//! condition from the user's point of view.

use std::fmt;
use std::path::PathBuf;

use shelf_primitives::RecordId;
use thiserror::Error;

use crate::SessionState;

/// Failure while loading a library on the worker pool.
#[derive(Debug, Error)]
pub enum LoadError {
	#[error("failed to read {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse {path}: {message}")]
	Parse { path: PathBuf, message: String },

	/// The worker task panicked or could not be joined.
	#[error("load worker failed: {0}")]
	Worker(String),
}

/// Failure while writing a library.
#[derive(Debug, Error)]
pub enum SaveError {
	#[error("library has no backing file")]
	NoPath,

	#[error("failed to write {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to serialize library: {0}")]
	Serialize(String),

	/// The worker task panicked or could not be joined.
	#[error("save worker failed: {0}")]
	Worker(String),
}

/// Failure reported by an attached collaborator service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

impl ServiceError {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}

/// Attached services, in teardown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
	ChangeMonitor,
	Index,
	Autosave,
	Backup,
}

impl fmt::Display for ServiceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::ChangeMonitor => "change monitor",
			Self::Index => "index",
			Self::Autosave => "autosave",
			Self::Backup => "backup",
		})
	}
}

/// Failure stopping one attached service during close.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to stop {service}: {reason}")]
pub struct ServiceTeardownError {
	pub service: ServiceKind,
	pub reason: String,
}

/// Clipboard access failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

/// Errors returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
	/// Lifecycle operation called from a state that does not allow it.
	#[error("cannot {op} while session is {state}")]
	InvalidState { op: &'static str, state: SessionState },

	/// Edit operation called before the library finished loading or after close.
	#[error("cannot {op}: library is {state}")]
	NotReady { op: &'static str, state: SessionState },

	/// The user declined a required confirmation.
	#[error("operation aborted by user")]
	Aborted,

	/// Cut copied a different set of records than it removed and was undone.
	#[error("cut rolled back: copied {copied} entries but removed {removed}")]
	CutRolledBack { copied: usize, removed: usize },

	#[error("unknown record {0}")]
	UnknownRecord(RecordId),

	#[error(transparent)]
	Clipboard(#[from] ClipboardError),

	#[error(transparent)]
	Save(#[from] SaveError),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

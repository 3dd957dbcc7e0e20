use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counter for generating unique record IDs.
static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Counter for generating unique document IDs.
static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable internal identifier of a record.
///
/// Used for linking, selection, navigation, and undo referencing. Never reused
/// within one process, so a stale ID held by navigation history can only ever
/// miss, not alias another record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl RecordId {
	/// Generates a new unique record ID.
	pub fn next() -> Self {
		Self(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "r{}", self.0)
	}
}

/// Unique identifier for an open document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl DocumentId {
	/// Generates a new unique document ID.
	pub fn next() -> Self {
		Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
	}

	/// The placeholder document ID used while a session is loading.
	pub const PLACEHOLDER: DocumentId = DocumentId(0);
}

impl fmt::Display for DocumentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "doc{}", self.0)
	}
}

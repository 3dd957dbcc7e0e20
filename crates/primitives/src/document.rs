//! Document context - the in-memory aggregate of one open library.
//!
//! A [`DocumentContext`] holds the ordered record collection together with its
//! backing location and metadata. While a session is open the context is owned
//! exclusively by that session; everything else reads it by reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DocumentId, FieldChange, Record, RecordId};

/// Where a document's authoritative copy lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Location {
	/// A file on this machine. Changes persist only when saved.
	#[default]
	Local,
	/// A shared store that synchronizes changes continuously.
	Shared,
}

/// Field set convention of a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryMode {
	#[default]
	BibTeX,
	BibLaTeX,
}

/// One named group definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
	pub name: String,
	/// Keyword that places a record in this group.
	pub keyword: Option<String>,
}

/// Library-level metadata carried alongside the records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextMetadata {
	pub mode: EntryMode,
	pub groups: Vec<GroupDef>,
}

/// Address handed to a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
	pub path: PathBuf,
	pub location: Location,
}

impl SourceLocation {
	pub fn local(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			location: Location::Local,
		}
	}

	pub fn shared(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			location: Location::Shared,
		}
	}
}

/// The aggregate root of one open library.
#[derive(Debug, Clone)]
pub struct DocumentContext {
	id: DocumentId,
	/// Backing file (None for unsaved libraries).
	pub path: Option<PathBuf>,
	pub location: Location,
	pub metadata: ContextMetadata,
	records: Vec<Record>,
}

impl DocumentContext {
	/// Creates an empty context with a fresh ID.
	pub fn new(path: Option<PathBuf>, location: Location) -> Self {
		Self {
			id: DocumentId::next(),
			path,
			location,
			metadata: ContextMetadata::default(),
			records: Vec::new(),
		}
	}

	/// Empty stand-in installed while the real context is loading.
	pub fn placeholder() -> Self {
		Self {
			id: DocumentId::PLACEHOLDER,
			path: None,
			location: Location::Local,
			metadata: ContextMetadata::default(),
			records: Vec::new(),
		}
	}

	/// Builder-style record population.
	#[must_use]
	pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
		self.records.extend(records);
		self
	}

	pub fn id(&self) -> DocumentId {
		self.id
	}

	pub fn is_placeholder(&self) -> bool {
		self.id == DocumentId::PLACEHOLDER
	}

	pub fn backing_path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	/// Display title: file name, or `untitled`.
	pub fn title(&self) -> String {
		self.path
			.as_deref()
			.and_then(Path::file_name)
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "untitled".to_string())
	}

	pub fn records(&self) -> &[Record] {
		&self.records
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn get(&self, id: RecordId) -> Option<&Record> {
		self.records.iter().find(|r| r.id() == id)
	}

	pub fn contains(&self, id: RecordId) -> bool {
		self.position(id).is_some()
	}

	pub fn position(&self, id: RecordId) -> Option<usize> {
		self.records.iter().position(|r| r.id() == id)
	}

	/// Appends a record at the end.
	pub fn push(&mut self, record: Record) -> usize {
		self.records.push(record);
		self.records.len() - 1
	}

	/// Inserts a record at `index`, clamped to the collection length.
	pub fn insert_at(&mut self, index: usize, record: Record) {
		let index = index.min(self.records.len());
		self.records.insert(index, record);
	}

	/// Removes a record, returning it with its former position.
	pub fn remove(&mut self, id: RecordId) -> Option<(usize, Record)> {
		let index = self.position(id)?;
		Some((index, self.records.remove(index)))
	}

	/// Applies a field change. Returns false if the record is absent.
	pub fn apply_field_change(&mut self, change: &FieldChange) -> bool {
		match self.records.iter_mut().find(|r| r.id() == change.record) {
			Some(record) => {
				record.set(&change.field, change.new.clone());
				true
			}
			None => false,
		}
	}
}

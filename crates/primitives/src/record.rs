use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::RecordId;

/// Well-known field names.
pub mod fields {
	/// `;`-separated list of linked files.
	pub const FILE: &str = "file";
}

/// One bibliographic entry.
///
/// Fields are kept in a sorted map so two records with the same content
/// compare and serialize identically regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
	id: RecordId,
	fields: BTreeMap<String, String>,
}

impl Default for Record {
	fn default() -> Self {
		Self::new()
	}
}

impl Record {
	/// Creates an empty record with a fresh ID.
	pub fn new() -> Self {
		Self::with_id(RecordId::next())
	}

	/// Creates an empty record with an explicit ID.
	pub fn with_id(id: RecordId) -> Self {
		Self { id, fields: BTreeMap::new() }
	}

	/// Builder-style field setter.
	#[must_use]
	pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}

	pub fn id(&self) -> RecordId {
		self.id
	}

	/// Returns the value of a field, if set.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.fields.get(name).map(String::as_str)
	}

	/// Iterates fields in name order.
	pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
		self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn field_count(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Sets or clears a field, returning the previous value.
	///
	/// `None` removes the field.
	pub fn set(&mut self, name: &str, value: Option<String>) -> Option<String> {
		match value {
			Some(value) => self.fields.insert(name.to_string(), value),
			None => self.fields.remove(name),
		}
	}

	/// Paths listed in the `file` field.
	pub fn linked_files(&self) -> Vec<PathBuf> {
		self.get(fields::FILE)
			.map(|raw| raw.split(';').map(str::trim).filter(|s| !s.is_empty()).map(PathBuf::from).collect())
			.unwrap_or_default()
	}

	/// Returns true when both records carry the same fields, ignoring IDs.
	pub fn same_content(&self, other: &Record) -> bool {
		self.fields == other.fields
	}

	/// Returns a copy with a freshly generated ID.
	#[must_use]
	pub fn with_fresh_id(&self) -> Self {
		Self {
			id: RecordId::next(),
			fields: self.fields.clone(),
		}
	}

	/// Canonicalizes field names and values.
	///
	/// Names are trimmed and lower-cased, values trimmed, and fields whose
	/// name or value ends up empty are dropped. The ID is preserved.
	#[must_use]
	pub fn normalized(&self) -> Self {
		let fields = self
			.fields
			.iter()
			.filter_map(|(name, value)| {
				let name = name.trim().to_lowercase();
				let value = value.trim();
				(!name.is_empty() && !value.is_empty()).then(|| (name, value.to_string()))
			})
			.collect();
		Self { id: self.id, fields }
	}
}

/// One field mutation on one record.
///
/// `None` on either side means the field was absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
	pub record: RecordId,
	pub field: String,
	pub old: Option<String>,
	pub new: Option<String>,
}

impl FieldChange {
	/// Returns the change that undoes this one.
	#[must_use]
	pub fn inverted(&self) -> Self {
		Self {
			record: self.record,
			field: self.field.clone(),
			old: self.new.clone(),
			new: self.old.clone(),
		}
	}

	/// Returns true when the change does not alter the value.
	pub fn is_noop(&self) -> bool {
		self.old == self.new
	}
}

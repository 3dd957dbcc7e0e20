//! Core library types: records, field changes, and document contexts.

/// Document context and backing location types.
pub mod document;
/// Identifier types for records and documents.
pub mod ids;
/// Record and field change types.
pub mod record;

pub use document::{ContextMetadata, DocumentContext, EntryMode, GroupDef, Location, SourceLocation};
pub use ids::{DocumentId, RecordId};
pub use record::{FieldChange, Record, fields};

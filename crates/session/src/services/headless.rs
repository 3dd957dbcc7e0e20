//! Collaborators for running a session without a UI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shelf_primitives::{ContextMetadata, DocumentContext, FieldChange, Record, RecordId, SourceLocation};
use shelf_worker::TaskProgress;
use tracing::{error, info, warn};

use super::{
	AutosaveManager, BackupManager, ChangeMonitor, ChangeSource, Clipboard, DialogService, DocumentWriter, IdentifierImporter, IndexManager,
	LinkedFileCleaner, LoadedDocument, Loader, Notification, NotificationLevel, Prompt, PromptChoice, PromptKind, RecordCodec, ServiceHandle,
};
use crate::config::SessionPreferences;
use crate::error::{ClipboardError, LoadError, SaveError, ServiceError};
use crate::msg::MsgSender;

/// Index that indexes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIndex;

impl IndexManager for NoopIndex {
	fn open(&mut self, _ctx: &DocumentContext) -> Result<(), ServiceError> {
		Ok(())
	}

	fn close(&mut self) -> Result<(), ServiceError> {
		Ok(())
	}

	fn add_to_index(&mut self, _records: &[Record]) {}

	fn remove_from_index(&mut self, _ids: &[RecordId]) {}

	fn update_entry(&mut self, _change: &FieldChange) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAutosave;

impl AutosaveManager for NoopAutosave {
	fn start(&mut self, _ctx: &DocumentContext, _changes: ChangeSource, _requests: MsgSender) -> Result<ServiceHandle, ServiceError> {
		Ok(ServiceHandle::detached("autosave"))
	}

	fn shutdown(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
		handle.stop();
		Ok(())
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackup;

impl BackupManager for NoopBackup {
	fn start(
		&mut self,
		_notifier: MsgSender,
		_ctx: &DocumentContext,
		_changes: ChangeSource,
		_metadata: &ContextMetadata,
		_preferences: &SessionPreferences,
	) -> Result<ServiceHandle, ServiceError> {
		Ok(ServiceHandle::detached("backup"))
	}

	fn shutdown(&mut self, handle: ServiceHandle, _backup_dir: &Path, _keep_backup: bool) -> Result<(), ServiceError> {
		handle.stop();
		Ok(())
	}

	fn discard_backup(&mut self, _ctx: &DocumentContext, _backup_dir: &Path) -> Result<(), ServiceError> {
		Ok(())
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl ChangeMonitor for NoopMonitor {
	fn register(&mut self, _ctx: &DocumentContext, _notifier: MsgSender) -> Result<ServiceHandle, ServiceError> {
		Ok(ServiceHandle::detached("change-monitor"))
	}

	fn unregister(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
		handle.stop();
		Ok(())
	}
}

/// Process-local clipboard.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
	text: Option<String>,
}

impl Clipboard for MemoryClipboard {
	fn set_contents(&mut self, text: String) -> Result<(), ClipboardError> {
		self.text = Some(text);
		Ok(())
	}

	fn contents(&self) -> Result<Option<String>, ClipboardError> {
		Ok(self.text.clone())
	}

	fn clear(&mut self) {
		self.text = None;
	}
}

/// Plain-text record codec.
///
/// Each record is a block of `name = value` lines; blocks are separated by
/// blank lines. Line breaks inside values are folded to spaces. Records
/// without fields have no representation and are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineCodec;

impl RecordCodec for LineCodec {
	fn serialize(&self, records: &[Record]) -> String {
		let blocks: Vec<String> = records
			.iter()
			.filter(|record| !record.is_empty())
			.map(|record| {
				record
					.fields()
					.map(|(name, value)| format!("{name} = {}", value.replace(['\r', '\n'], " ")))
					.collect::<Vec<_>>()
					.join("\n")
			})
			.collect();
		blocks.join("\n\n")
	}

	fn parse(&self, text: &str) -> Vec<Record> {
		let mut records = Vec::new();
		let mut current = Record::new();
		for line in text.lines().map(str::trim) {
			if line.is_empty() {
				if !current.is_empty() {
					records.push(std::mem::take(&mut current));
				}
				continue;
			}
			if let Some((name, value)) = line.split_once('=') {
				let (name, value) = (name.trim(), value.trim());
				if !name.is_empty() && !value.is_empty() {
					current.set(name, Some(value.to_string()));
				}
			}
		}
		if !current.is_empty() {
			records.push(current);
		}
		records
	}
}

/// Importer that recognizes no identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImport;

impl IdentifierImporter for NoImport {
	fn import(&mut self, _text: &str) -> Vec<Record> {
		Vec::new()
	}
}

/// Cleaner that leaves linked files alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCleanup;

impl LinkedFileCleaner for NoCleanup {
	fn cleanup(&mut self, _files: &[PathBuf]) -> Result<(), ServiceError> {
		Ok(())
	}
}

/// Writer that accepts every save without touching the disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl DocumentWriter for NullWriter {
	fn write(&self, _ctx: &DocumentContext, _path: &Path) -> Result<(), SaveError> {
		Ok(())
	}
}

/// Writes libraries in [`LineCodec`] form.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineFileWriter;

impl DocumentWriter for LineFileWriter {
	fn write(&self, ctx: &DocumentContext, path: &Path) -> Result<(), SaveError> {
		let text = LineCodec.serialize(ctx.records());
		std::fs::write(path, text).map_err(|source| SaveError::Io {
			path: path.to_path_buf(),
			source,
		})
	}
}

/// Loader serving a fixed record set, or reading [`LineCodec`] files.
#[derive(Debug, Default, Clone)]
pub enum MemoryLoader {
	/// Returns these records for any source.
	Records(Vec<Record>),
	/// Reads and parses the source path.
	#[default]
	LineFile,
}

#[async_trait]
impl Loader for MemoryLoader {
	async fn load(&self, source: &SourceLocation, progress: &TaskProgress) -> Result<LoadedDocument, LoadError> {
		let records = match self {
			Self::Records(records) => records.clone(),
			Self::LineFile => {
				let text = tokio::fs::read_to_string(&source.path).await.map_err(|source_err| LoadError::Io {
					path: source.path.clone(),
					source: source_err,
				})?;
				LineCodec.parse(&text)
			}
		};
		progress.set_progress(1.0);
		let context = DocumentContext::new(Some(source.path.clone()), source.location).with_records(records);
		Ok(LoadedDocument::new(context))
	}
}

/// Dialog service for headless sessions.
///
/// Confirms every delete and answers the close prompt with a fixed choice.
/// A close prompt that reports a failed save is answered with
/// [`PromptChoice::Cancel`] so a close never loops on a broken writer.
#[derive(Debug, Clone)]
pub struct AutoConfirm {
	close_choice: PromptChoice,
}

impl AutoConfirm {
	pub fn new(close_choice: PromptChoice) -> Self {
		Self { close_choice }
	}
}

impl DialogService for AutoConfirm {
	fn confirm(&mut self, prompt: &Prompt) -> PromptChoice {
		match &prompt.kind {
			PromptKind::DeleteRecords { .. } => PromptChoice::Confirm,
			PromptKind::UnsavedChanges { save_error: Some(_) } => PromptChoice::Cancel,
			PromptKind::UnsavedChanges { save_error: None } => self.close_choice,
		}
	}

	fn notify(&mut self, notification: Notification) {
		match notification.level {
			NotificationLevel::Info => info!(message = %notification.message, "notify"),
			NotificationLevel::Warning => warn!(message = %notification.message, "notify"),
			NotificationLevel::Error => error!(message = %notification.message, "notify"),
		}
	}
}

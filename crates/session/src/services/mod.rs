//! Collaborator interfaces attached to a session.
//!
//! The session never reaches for globals: every collaborator is handed over
//! in a [`SessionServices`] bundle at construction. Long-running services
//! (autosave, backup, change monitoring) return a [`ServiceHandle`] from
//! `start` and get it back on shutdown.
//!
//! Background services talk to the session only through the [`MsgSender`]
//! they receive; their messages are applied when the session drains its
//! queue.
//!
//! [`headless`] provides implementations for running a session without a UI.

pub mod headless;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shelf_primitives::{ContextMetadata, DocumentContext, FieldChange, Record, RecordId, SourceLocation};
use shelf_worker::TaskProgress;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SessionPreferences;
use crate::error::{ClipboardError, LoadError, SaveError, ServiceError};
use crate::msg::MsgSender;

/// Revision counter bumped after every library mutation.
pub type ChangeSource = watch::Receiver<u64>;

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadedDocument {
	pub context: DocumentContext,
	/// The loader rewrote the library into the current format. The rewrite
	/// cannot be undone, so the session marks itself non-undoably modified.
	pub migrated: bool,
	/// Recoverable problems found while parsing, shown to the user.
	pub warnings: Vec<String>,
}

impl LoadedDocument {
	pub fn new(context: DocumentContext) -> Self {
		Self {
			context,
			migrated: false,
			warnings: Vec::new(),
		}
	}
}

/// Parses a library. Runs on the worker pool.
#[async_trait]
pub trait Loader: Send + Sync {
	async fn load(&self, source: &SourceLocation, progress: &TaskProgress) -> Result<LoadedDocument, LoadError>;
}

/// Full-text index kept in step with the library.
///
/// Updates are fire-and-forget; the session only guarantees they are
/// submitted in edit order.
pub trait IndexManager: Send {
	fn open(&mut self, ctx: &DocumentContext) -> Result<(), ServiceError>;
	fn close(&mut self) -> Result<(), ServiceError>;
	fn add_to_index(&mut self, records: &[Record]);
	fn remove_from_index(&mut self, ids: &[RecordId]);
	fn update_entry(&mut self, change: &FieldChange);
}

/// Running background service.
#[derive(Debug)]
pub struct ServiceHandle {
	name: &'static str,
	cancel: CancellationToken,
	task: Option<JoinHandle<()>>,
}

impl ServiceHandle {
	pub fn new(name: &'static str, cancel: CancellationToken) -> Self {
		Self { name, cancel, task: None }
	}

	/// Handle for a service with no background task of its own.
	pub fn detached(name: &'static str) -> Self {
		Self::new(name, CancellationToken::new())
	}

	#[must_use]
	pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
		self.task = Some(task);
		self
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Signals the service to stop and returns its task for optional joining.
	pub fn stop(self) -> Option<JoinHandle<()>> {
		tracing::trace!(service = self.name, "service.stop");
		self.cancel.cancel();
		self.task
	}
}

/// Saves the library after changes settle.
pub trait AutosaveManager: Send {
	/// Starts watching `changes`; save requests are sent on `requests`.
	fn start(&mut self, ctx: &DocumentContext, changes: ChangeSource, requests: MsgSender) -> Result<ServiceHandle, ServiceError>;
	fn shutdown(&mut self, handle: ServiceHandle) -> Result<(), ServiceError>;
}

/// Keeps a rolling backup of a local library.
pub trait BackupManager: Send {
	fn start(
		&mut self,
		notifier: MsgSender,
		ctx: &DocumentContext,
		changes: ChangeSource,
		metadata: &ContextMetadata,
		preferences: &SessionPreferences,
	) -> Result<ServiceHandle, ServiceError>;

	/// Stops backing up. The last backup survives when `keep_backup` is set.
	fn shutdown(&mut self, handle: ServiceHandle, backup_dir: &Path, keep_backup: bool) -> Result<(), ServiceError>;

	/// Deletes the backup belonging to `ctx`.
	fn discard_backup(&mut self, ctx: &DocumentContext, backup_dir: &Path) -> Result<(), ServiceError>;
}

/// Watches the backing file for changes made by other programs.
///
/// Detected changes are reported as [`crate::msg::SessionMsg::ExternalChange`].
pub trait ChangeMonitor: Send {
	fn register(&mut self, ctx: &DocumentContext, notifier: MsgSender) -> Result<ServiceHandle, ServiceError>;
	fn unregister(&mut self, handle: ServiceHandle) -> Result<(), ServiceError>;
}

/// Writes a library to disk. Called from the worker pool for background saves.
pub trait DocumentWriter: Send + Sync {
	fn write(&self, ctx: &DocumentContext, path: &Path) -> Result<(), SaveError>;
}

pub trait Clipboard: Send {
	fn set_contents(&mut self, text: String) -> Result<(), ClipboardError>;
	fn contents(&self) -> Result<Option<String>, ClipboardError>;
	fn clear(&mut self);
}

/// Text form of records used for the clipboard.
pub trait RecordCodec: Send {
	fn serialize(&self, records: &[Record]) -> String;
	/// Parses records from text. Unparseable text yields no records.
	fn parse(&self, text: &str) -> Vec<Record>;
}

/// Resolves identifiers (DOIs, ISBNs, ...) found in pasted text to records.
pub trait IdentifierImporter: Send {
	fn import(&mut self, text: &str) -> Vec<Record>;
}

/// Removes files that only deleted records linked to.
pub trait LinkedFileCleaner: Send {
	fn cleanup(&mut self, files: &[PathBuf]) -> Result<(), ServiceError>;
}

/// What a prompt is asking about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
	DeleteRecords { count: usize },
	/// Closing a modified local library. `save_error` carries the reason a
	/// previous save attempt failed.
	UnsavedChanges { save_error: Option<String> },
}

/// User answer to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
	Confirm,
	Save,
	Discard,
	Cancel,
}

/// Modal question shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
	pub kind: PromptKind,
	pub title: String,
	pub message: String,
	pub options: Vec<PromptChoice>,
}

impl Prompt {
	pub fn delete_records(count: usize) -> Self {
		let title = if count == 1 {
			"Delete entry?".to_string()
		} else {
			format!("Delete {count} entries?")
		};
		let message = if count == 1 {
			"Really delete the selected entry?".to_string()
		} else {
			format!("Really delete the {count} selected entries?")
		};
		Self {
			kind: PromptKind::DeleteRecords { count },
			title,
			message,
			options: vec![PromptChoice::Confirm, PromptChoice::Cancel],
		}
	}

	pub fn unsaved_changes(library: &str, save_error: Option<String>) -> Self {
		let mut message = format!("Library '{library}' has changed.");
		if let Some(err) = &save_error {
			message.push_str(&format!(" Saving failed: {err}."));
		}
		Self {
			kind: PromptKind::UnsavedChanges { save_error },
			title: "Save before closing".to_string(),
			message,
			options: vec![PromptChoice::Save, PromptChoice::Discard, PromptChoice::Cancel],
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
	Info,
	Warning,
	Error,
}

/// Non-modal message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
	pub level: NotificationLevel,
	pub message: String,
}

impl Notification {
	pub fn info(message: impl Into<String>) -> Self {
		Self {
			level: NotificationLevel::Info,
			message: message.into(),
		}
	}

	pub fn warning(message: impl Into<String>) -> Self {
		Self {
			level: NotificationLevel::Warning,
			message: message.into(),
		}
	}

	pub fn error(message: impl Into<String>) -> Self {
		Self {
			level: NotificationLevel::Error,
			message: message.into(),
		}
	}
}

/// Modal prompts and notifications.
pub trait DialogService: Send {
	fn confirm(&mut self, prompt: &Prompt) -> PromptChoice;
	fn notify(&mut self, notification: Notification);
}

/// Every collaborator a session talks to.
pub struct SessionServices {
	pub loader: Arc<dyn Loader>,
	pub writer: Arc<dyn DocumentWriter>,
	pub index: Box<dyn IndexManager>,
	pub autosave: Box<dyn AutosaveManager>,
	pub backup: Box<dyn BackupManager>,
	pub monitor: Box<dyn ChangeMonitor>,
	pub clipboard: Box<dyn Clipboard>,
	pub codec: Box<dyn RecordCodec>,
	pub importer: Box<dyn IdentifierImporter>,
	pub cleaner: Box<dyn LinkedFileCleaner>,
	pub dialogs: Box<dyn DialogService>,
}

impl SessionServices {
	/// Headless bundle around `loader`: no-op services, an in-memory
	/// clipboard, and a dialog service that confirms deletes and discards
	/// unsaved changes.
	pub fn headless(loader: Arc<dyn Loader>) -> Self {
		use headless::*;

		Self {
			loader,
			writer: Arc::new(NullWriter),
			index: Box::new(NoopIndex),
			autosave: Box::new(NoopAutosave),
			backup: Box::new(NoopBackup),
			monitor: Box::new(NoopMonitor),
			clipboard: Box::new(MemoryClipboard::default()),
			codec: Box::new(LineCodec),
			importer: Box::new(NoImport),
			cleaner: Box::new(NoCleanup),
			dialogs: Box::new(AutoConfirm::new(PromptChoice::Discard)),
		}
	}

	#[must_use]
	pub fn with_writer(mut self, writer: Arc<dyn DocumentWriter>) -> Self {
		self.writer = writer;
		self
	}

	#[must_use]
	pub fn with_index(mut self, index: impl IndexManager + 'static) -> Self {
		self.index = Box::new(index);
		self
	}

	#[must_use]
	pub fn with_autosave(mut self, autosave: impl AutosaveManager + 'static) -> Self {
		self.autosave = Box::new(autosave);
		self
	}

	#[must_use]
	pub fn with_backup(mut self, backup: impl BackupManager + 'static) -> Self {
		self.backup = Box::new(backup);
		self
	}

	#[must_use]
	pub fn with_monitor(mut self, monitor: impl ChangeMonitor + 'static) -> Self {
		self.monitor = Box::new(monitor);
		self
	}

	#[must_use]
	pub fn with_clipboard(mut self, clipboard: impl Clipboard + 'static) -> Self {
		self.clipboard = Box::new(clipboard);
		self
	}

	#[must_use]
	pub fn with_codec(mut self, codec: impl RecordCodec + 'static) -> Self {
		self.codec = Box::new(codec);
		self
	}

	#[must_use]
	pub fn with_importer(mut self, importer: impl IdentifierImporter + 'static) -> Self {
		self.importer = Box::new(importer);
		self
	}

	#[must_use]
	pub fn with_cleaner(mut self, cleaner: impl LinkedFileCleaner + 'static) -> Self {
		self.cleaner = Box::new(cleaner);
		self
	}

	#[must_use]
	pub fn with_dialogs(mut self, dialogs: impl DialogService + 'static) -> Self {
		self.dialogs = Box::new(dialogs);
		self
	}
}

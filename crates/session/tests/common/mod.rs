//! Recording collaborators shared by the session scenarios.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shelf_primitives::{ContextMetadata, DocumentContext, FieldChange, Location, Record, RecordId, SourceLocation};
use shelf_session::msg::MsgSender;
use shelf_session::services::headless::MemoryLoader;
use shelf_session::services::{
	AutosaveManager, BackupManager, ChangeMonitor, ChangeSource, DialogService, DocumentWriter, IndexManager, LoadedDocument, Loader,
	Notification, Prompt, PromptChoice, PromptKind, ServiceHandle, SessionServices,
};
use shelf_session::{LoadError, SaveError, ServiceError, SessionPreferences};
use shelf_worker::TaskProgress;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Ordered call log shared between collaborators.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
	pub fn push(&self, entry: impl Into<String>) {
		self.0.lock().unwrap().push(entry.into());
	}

	pub fn entries(&self) -> Vec<String> {
		self.0.lock().unwrap().clone()
	}

	pub fn contains(&self, entry: &str) -> bool {
		self.0.lock().unwrap().iter().any(|e| e == entry)
	}
}

pub struct RecordingIndex(pub Log);

impl IndexManager for RecordingIndex {
	fn open(&mut self, ctx: &DocumentContext) -> Result<(), ServiceError> {
		self.0.push(format!("index.open {}", ctx.len()));
		Ok(())
	}

	fn close(&mut self) -> Result<(), ServiceError> {
		self.0.push("index.close");
		Ok(())
	}

	fn add_to_index(&mut self, records: &[Record]) {
		self.0.push(format!("index.add {}", records.len()));
	}

	fn remove_from_index(&mut self, ids: &[RecordId]) {
		self.0.push(format!("index.remove {}", ids.len()));
	}

	fn update_entry(&mut self, change: &FieldChange) {
		self.0.push(format!("index.update {}", change.field));
	}
}

pub struct RecordingAutosave(pub Log);

impl AutosaveManager for RecordingAutosave {
	fn start(&mut self, _ctx: &DocumentContext, _changes: ChangeSource, _requests: MsgSender) -> Result<ServiceHandle, ServiceError> {
		self.0.push("autosave.start");
		Ok(ServiceHandle::detached("autosave"))
	}

	fn shutdown(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
		self.0.push("autosave.shutdown");
		handle.stop();
		Ok(())
	}
}

pub struct RecordingBackup(pub Log);

impl BackupManager for RecordingBackup {
	fn start(
		&mut self,
		_notifier: MsgSender,
		_ctx: &DocumentContext,
		_changes: ChangeSource,
		_metadata: &ContextMetadata,
		_preferences: &SessionPreferences,
	) -> Result<ServiceHandle, ServiceError> {
		self.0.push("backup.start");
		Ok(ServiceHandle::detached("backup"))
	}

	fn shutdown(&mut self, handle: ServiceHandle, _backup_dir: &Path, keep_backup: bool) -> Result<(), ServiceError> {
		self.0.push(format!("backup.shutdown keep={keep_backup}"));
		handle.stop();
		Ok(())
	}

	fn discard_backup(&mut self, _ctx: &DocumentContext, _backup_dir: &Path) -> Result<(), ServiceError> {
		self.0.push("backup.discard");
		Ok(())
	}
}

/// Monitor that hands its notifier to the test.
pub struct RecordingMonitor {
	pub log: Log,
	pub notifier: Arc<Mutex<Option<MsgSender>>>,
}

impl ChangeMonitor for RecordingMonitor {
	fn register(&mut self, ctx: &DocumentContext, notifier: MsgSender) -> Result<ServiceHandle, ServiceError> {
		self.log.push(format!("monitor.register {}", ctx.title()));
		*self.notifier.lock().unwrap() = Some(notifier);
		Ok(ServiceHandle::detached("change-monitor"))
	}

	fn unregister(&mut self, handle: ServiceHandle) -> Result<(), ServiceError> {
		self.log.push("monitor.unregister");
		handle.stop();
		Ok(())
	}
}

/// Writer that records each write and optionally fails.
pub struct RecordingWriter {
	pub log: Log,
	pub fail: bool,
}

impl DocumentWriter for RecordingWriter {
	fn write(&self, ctx: &DocumentContext, path: &Path) -> Result<(), SaveError> {
		self.log.push(format!("write {} {}", path.display(), ctx.len()));
		if self.fail {
			Err(SaveError::Serialize("disk full".into()))
		} else {
			Ok(())
		}
	}
}

/// Writer keeping only the record count of the last write, like a file
/// that each save replaces. Writes of `slow_len` records take `delay`.
#[derive(Clone, Default)]
pub struct DiskWriter {
	pub disk: Arc<Mutex<Option<usize>>>,
	pub writes: Arc<Mutex<Vec<usize>>>,
	pub slow_len: usize,
	pub delay: Duration,
}

impl DiskWriter {
	pub fn slow_for(slow_len: usize, delay: Duration) -> Self {
		Self {
			slow_len,
			delay,
			..Self::default()
		}
	}

	pub fn on_disk(&self) -> Option<usize> {
		*self.disk.lock().unwrap()
	}

	pub fn writes(&self) -> Vec<usize> {
		self.writes.lock().unwrap().clone()
	}
}

impl DocumentWriter for DiskWriter {
	fn write(&self, ctx: &DocumentContext, _path: &Path) -> Result<(), SaveError> {
		if ctx.len() == self.slow_len {
			std::thread::sleep(self.delay);
		}
		self.writes.lock().unwrap().push(ctx.len());
		*self.disk.lock().unwrap() = Some(ctx.len());
		Ok(())
	}
}

/// Dialog answering close prompts from a script and recording everything.
#[derive(Clone, Default)]
pub struct ScriptedDialog {
	pub answers: Arc<Mutex<VecDeque<PromptChoice>>>,
	pub prompts: Arc<Mutex<Vec<Prompt>>>,
	pub notifications: Arc<Mutex<Vec<Notification>>>,
}

impl ScriptedDialog {
	pub fn answering(choices: impl IntoIterator<Item = PromptChoice>) -> Self {
		let dialog = Self::default();
		dialog.answers.lock().unwrap().extend(choices);
		dialog
	}

	pub fn prompts(&self) -> Vec<Prompt> {
		self.prompts.lock().unwrap().clone()
	}

	pub fn notifications(&self) -> Vec<Notification> {
		self.notifications.lock().unwrap().clone()
	}
}

impl DialogService for ScriptedDialog {
	fn confirm(&mut self, prompt: &Prompt) -> PromptChoice {
		self.prompts.lock().unwrap().push(prompt.clone());
		let scripted = self.answers.lock().unwrap().pop_front();
		scripted.unwrap_or(match prompt.kind {
			PromptKind::DeleteRecords { .. } => PromptChoice::Confirm,
			PromptKind::UnsavedChanges { .. } => PromptChoice::Cancel,
		})
	}

	fn notify(&mut self, notification: Notification) {
		self.notifications.lock().unwrap().push(notification);
	}
}

pub struct FailingLoader;

#[async_trait]
impl Loader for FailingLoader {
	async fn load(&self, source: &SourceLocation, _progress: &TaskProgress) -> Result<LoadedDocument, LoadError> {
		Err(LoadError::Parse {
			path: source.path.clone(),
			message: "unexpected '@' at line 3".into(),
		})
	}
}

pub struct PanickingLoader;

#[async_trait]
impl Loader for PanickingLoader {
	async fn load(&self, _source: &SourceLocation, _progress: &TaskProgress) -> Result<LoadedDocument, LoadError> {
		panic!("parser exploded");
	}
}

pub fn records(titles: &[&str]) -> Vec<Record> {
	titles.iter().map(|t| Record::new().field("title", *t)).collect()
}

pub fn source() -> SourceLocation {
	SourceLocation {
		path: "/library/refs.bib".into(),
		location: Location::Local,
	}
}

/// Every collaborator recording into `log`.
pub struct Harness {
	pub log: Log,
	pub dialog: ScriptedDialog,
	pub notifier: Arc<Mutex<Option<MsgSender>>>,
}

impl Harness {
	pub fn new(dialog: ScriptedDialog) -> Self {
		Self {
			log: Log::default(),
			dialog,
			notifier: Arc::default(),
		}
	}

	pub fn services(&self, loader: Arc<dyn Loader>, writer_fails: bool) -> SessionServices {
		SessionServices::headless(loader)
			.with_writer(Arc::new(RecordingWriter {
				log: self.log.clone(),
				fail: writer_fails,
			}))
			.with_index(RecordingIndex(self.log.clone()))
			.with_autosave(RecordingAutosave(self.log.clone()))
			.with_backup(RecordingBackup(self.log.clone()))
			.with_monitor(RecordingMonitor {
				log: self.log.clone(),
				notifier: Arc::clone(&self.notifier),
			})
			.with_dialogs(self.dialog.clone())
	}

	pub fn memory_services(&self, titles: &[&str]) -> SessionServices {
		self.services(Arc::new(MemoryLoader::Records(records(titles))), false)
	}
}

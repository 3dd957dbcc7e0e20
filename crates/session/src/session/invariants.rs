use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shelf_primitives::{ContextMetadata, DocumentContext, Location, Record, SourceLocation};
use shelf_worker::{TaskProgress, TaskState};
use tokio::sync::Notify;

use super::tests::{Probe, load_into, probed_services, ready_session, ready_with, titled};
use super::{Session, SessionState};
use crate::config::SessionPreferences;
use crate::error::{LoadError, ServiceError, ServiceKind, SessionError};
use crate::msg::{LoadMsg, MsgSender};
use crate::services::{BackupManager, ChangeMonitor, ChangeSource, LoadedDocument, Loader, ServiceHandle, SessionServices};
use crate::undo::DeleteKind;

/// Loader that finishes only when the gate is opened.
struct GatedLoader {
	gate: Arc<Notify>,
	records: Vec<Record>,
}

#[async_trait]
impl Loader for GatedLoader {
	async fn load(&self, source: &SourceLocation, _progress: &TaskProgress) -> Result<LoadedDocument, LoadError> {
		self.gate.notified().await;
		let ctx = DocumentContext::new(Some(source.path.clone()), source.location).with_records(self.records.clone());
		Ok(LoadedDocument::new(ctx))
	}
}

/// Must reject every edit outside `Ready`.
///
/// - Enforced in: `Session::ensure_ready`
/// - Failure symptom: Edits land in the placeholder context and vanish when
///   the load completes, or touch a library whose services are gone.
#[cfg_attr(test, test)]
pub(crate) fn test_edits_require_ready() {
	let probe = Probe::default();
	let mut session = Session::new(probed_services(&probe), SessionPreferences::default());
	let not_ready = |result: Result<(), SessionError>| matches!(result, Err(SessionError::NotReady { .. }));

	assert!(not_ready(session.insert(titled(&["a"])).map(drop)));
	assert!(not_ready(session.delete(&[], DeleteKind::Delete).map(drop)));
	assert!(not_ready(session.cut(&[]).map(drop)));
	assert!(not_ready(session.copy(&[]).map(drop)));
	assert!(not_ready(session.paste("title = a").map(drop)));
	assert!(not_ready(session.select(&[])));
	assert!(not_ready(session.undo().map(drop)));

	let (mut session, _) = ready_session(titled(&["a"]));
	assert!(session.request_close().expect("close").is_closed());
	let err = session.insert(titled(&["b"])).unwrap_err();
	assert!(matches!(err, SessionError::NotReady { state: SessionState::Closed, .. }));
}

/// Must push exactly one undo unit per mutating operation.
///
/// - Enforced in: `Session::commit_insert`, `Session::delete`, `Session::set_field`, `Session::set_fields`
/// - Failure symptom: One undo step reverts half an operation, or several.
#[cfg_attr(test, test)]
pub(crate) fn test_one_undo_unit_per_mutation() {
	let (mut session, _) = ready_session(titled(&["a", "b", "c"]));
	let ids: Vec<_> = session.context().records().iter().map(Record::id).collect();
	let mut expected = 0;
	let mut step = |session: &Session| {
		expected += 1;
		assert_eq!(session.undo_log().undo_len(), expected);
	};

	session.insert(titled(&["d", "e"])).expect("insert");
	step(&session);
	session.delete(&ids[..2], DeleteKind::Delete).expect("delete");
	step(&session);
	session.set_fields(ids[2], vec![("year".into(), Some("1".into())), ("note".into(), Some("n".into()))]).expect("edit");
	step(&session);
	session.cut(&ids[2..]).expect("cut");
	step(&session);
	session.paste("title = x\n\ntitle = y").expect("paste");
	step(&session);
}

/// Must keep `non_undoable_modified` implying `modified`, and never clear
/// `modified` while a non-undoable change is pending.
///
/// - Enforced in: `ChangeTracker`, `Session::sync_tracker_with_log`
/// - Failure symptom: Closing after a format migration skips the save prompt
///   and the migration is silently lost.
#[cfg_attr(test, test)]
pub(crate) fn test_non_undoable_implies_modified() {
	let (mut session, _) = ready_session(titled(&["a"]));
	let holds = |session: &Session| {
		let tracker = session.tracker();
		!tracker.is_non_undoable_modified() || tracker.is_modified()
	};

	session.insert(titled(&["b"])).expect("insert");
	assert!(holds(&session));
	session.mark_non_undoable_changed().expect("mark");
	assert!(holds(&session));
	session.undo().expect("undo");
	assert!(holds(&session));
	assert!(session.tracker().is_modified(), "undo cannot clear a non-undoable change");
	session.save().expect("save");
	assert!(holds(&session));
	assert!(!session.tracker().is_modified());
}

/// Must bump the change revision on every mutation and only then.
///
/// - Enforced in: `Session::bump_revision` callers
/// - Failure symptom: Autosave and backup miss edits, or save unchanged
///   libraries on selection changes.
#[cfg_attr(test, test)]
pub(crate) fn test_revision_tracks_mutations() {
	let (mut session, _) = ready_session(titled(&["a"]));
	let id = session.context().records()[0].id();
	let start = session.revision();

	session.select(&[id]).expect("select");
	session.copy(&[id]).expect("copy");
	assert_eq!(session.revision(), start);

	session.set_field(id, "year", Some("2020".into())).expect("edit");
	assert_eq!(session.revision(), start + 1);
	session.undo().expect("undo");
	assert_eq!(session.revision(), start + 2);
	session.delete(&[id], DeleteKind::Delete).expect("delete");
	assert_eq!(session.revision(), start + 3);
}

/// Must ignore load completions that do not belong to the active load.
///
/// - Enforced in: `LoadMsg::apply` via `Session::is_current_load`
/// - Failure symptom: A superseded load overwrites the library the user is
///   looking at.
#[tokio::test]
pub(crate) async fn test_stale_load_completion_ignored() {
	let gate = Arc::new(Notify::new());
	let probe = Probe::default();
	let loader = GatedLoader {
		gate: Arc::clone(&gate),
		records: titled(&["real"]),
	};
	let services = SessionServices {
		loader: Arc::new(loader),
		..probed_services(&probe)
	};
	let mut session = Session::new(services, SessionPreferences::default());
	session.begin_load(SourceLocation::local("/library/refs.bib")).expect("load");

	let stale = DocumentContext::new(None, Location::Local).with_records(titled(&["stale"]));
	session
		.sender()
		.send(
			LoadMsg::Loaded {
				generation: 999,
				document: Box::new(LoadedDocument::new(stale)),
			}
			.into(),
		)
		.expect("send");
	assert_eq!(session.drain_messages(), 1);
	assert_eq!(session.state(), SessionState::Loading);
	assert!(session.context().is_placeholder());

	gate.notify_one();
	assert_eq!(session.wait_until_loaded().await, SessionState::Ready);
	assert_eq!(session.context().records()[0].get("title"), Some("real"));
}

/// Must not start services for a cancelled load, even if the load finishes.
///
/// - Enforced in: `Session::cancel_load`, `LoadMsg::apply`
/// - Failure symptom: An index or autosave task keeps running for a library
///   that was never opened.
#[tokio::test]
pub(crate) async fn test_cancelled_load_starts_no_services() {
	let gate = Arc::new(Notify::new());
	let probe = Probe::default();
	let services = SessionServices {
		loader: Arc::new(GatedLoader {
			gate: Arc::clone(&gate),
			records: titled(&["a"]),
		}),
		..probed_services(&probe)
	};
	let mut session = Session::new(services, SessionPreferences::default());
	let task = session.begin_load(SourceLocation::local("/library/refs.bib")).expect("load");

	session.cancel_load().expect("cancel");
	assert_eq!(session.state(), SessionState::Closed);
	assert_eq!(session.tasks().get(task).map(|t| t.state), Some(TaskState::Cancelled));

	gate.notify_one();
	tokio::task::yield_now().await;
	tokio::time::sleep(std::time::Duration::from_millis(10)).await;
	session.drain_messages();
	assert_eq!(session.state(), SessionState::Closed);
	assert!(probe.state().index.is_empty(), "index never opened");
}

#[derive(Debug, Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
	fn push(&self, call: impl Into<String>) {
		self.0.lock().unwrap().push(call.into());
	}

	fn get(&self) -> Vec<String> {
		self.0.lock().unwrap().clone()
	}
}

struct PanickingMonitor;

impl ChangeMonitor for PanickingMonitor {
	fn register(&mut self, _ctx: &DocumentContext, _notifier: MsgSender) -> Result<ServiceHandle, ServiceError> {
		Ok(ServiceHandle::detached("change-monitor"))
	}

	fn unregister(&mut self, _handle: ServiceHandle) -> Result<(), ServiceError> {
		panic!("watcher thread gone");
	}
}

struct RecordingBackup(Calls);

impl BackupManager for RecordingBackup {
	fn start(
		&mut self,
		_notifier: MsgSender,
		_ctx: &DocumentContext,
		_changes: ChangeSource,
		_metadata: &ContextMetadata,
		_preferences: &SessionPreferences,
	) -> Result<ServiceHandle, ServiceError> {
		self.0.push("start");
		Ok(ServiceHandle::detached("backup"))
	}

	fn shutdown(&mut self, _handle: ServiceHandle, _backup_dir: &Path, keep_backup: bool) -> Result<(), ServiceError> {
		self.0.push(format!("shutdown keep={keep_backup}"));
		Err(ServiceError::new("backup dir read-only"))
	}

	fn discard_backup(&mut self, _ctx: &DocumentContext, _backup_dir: &Path) -> Result<(), ServiceError> {
		self.0.push("discard");
		Ok(())
	}
}

/// Must stop every attached service even when earlier ones fail.
///
/// - Enforced in: `Session::teardown`
/// - Failure symptom: A panicking file watcher leaves the backup task
///   running after the library is closed.
#[cfg_attr(test, test)]
pub(crate) fn test_teardown_continues_after_failure() {
	let probe = Probe::default();
	let calls = Calls::default();
	let services = probed_services(&probe)
		.with_monitor(PanickingMonitor)
		.with_backup(RecordingBackup(calls.clone()));
	let mut session = ready_with(services, titled(&["a"]));

	let report = match session.request_close().expect("close") {
		super::CloseOutcome::Closed(report) => report,
		super::CloseOutcome::Cancelled => panic!("unmodified library closes"),
	};

	assert_eq!(session.state(), SessionState::Closed);
	let failed: Vec<ServiceKind> = report.failures.iter().map(|f| f.service).collect();
	assert_eq!(failed, vec![ServiceKind::ChangeMonitor, ServiceKind::Backup]);
	assert!(report.failures[0].reason.contains("watcher thread gone"));
	assert_eq!(probe.state().index.last().map(String::as_str), Some("close"));
	assert_eq!(calls.get(), vec!["start", "shutdown keep=true"]);
}

/// Must close shared libraries without a save prompt.
///
/// - Enforced in: `Session::request_close`
/// - Failure symptom: Users are asked to save a library that synchronizes
///   itself.
#[cfg_attr(test, test)]
pub(crate) fn test_shared_library_closes_without_prompt() {
	let probe = Probe::default();
	let ctx = DocumentContext::new(Some(PathBuf::from("/shared/refs")), Location::Shared);
	let mut session = load_into(Session::new(probed_services(&probe), SessionPreferences::default()), LoadedDocument::new(ctx));
	session.insert(titled(&["a"])).expect("insert");

	assert!(session.request_close().expect("close").is_closed());
	assert!(probe.state().prompts.is_empty());
}

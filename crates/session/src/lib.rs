//! Session lifecycle controller for an open bibliographic library.
//!
//! A [`Session`] loads a library on the worker pool, owns it while it is
//! open, routes every edit through change tracking and the undo log, keeps
//! attached services (index, autosave, backup, change monitor) in step, and
//! tears them down again on close.
//!
//! Collaborators are supplied through [`services::SessionServices`]; the
//! [`services::headless`] module has implementations for running without a
//! UI.

pub mod autosave;
pub mod change_tracker;
pub mod config;
pub mod error;
pub mod events;
pub mod msg;
pub mod navigation;
mod session;
pub mod services;
pub mod undo;

pub use change_tracker::ChangeTracker;
pub use config::{AutosaveConfig, SessionPreferences};
pub use error::{LoadError, SaveError, ServiceError, ServiceKind, ServiceTeardownError, SessionError};
pub use events::{HandlerId, SessionEvent};
pub use navigation::NavigationHistory;
pub use services::SessionServices;
pub use session::{CloseOutcome, CloseReport, PasteReport, Session, SessionState};
pub use undo::{DeleteKind, UndoLog};

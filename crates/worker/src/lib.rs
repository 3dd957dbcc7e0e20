//! Worker pool primitives and the background task registry.
//!
//! Long-running work (parsing, saving, backups, index rebuilds) runs here, off
//! the session's own execution context. Results are never applied from a
//! worker; callers marshal them back through a channel.

mod class;
mod generation;
mod registry;
mod spawn;

pub use class::TaskClass;
pub use generation::GenerationClock;
pub use registry::{TaskId, TaskOutcome, TaskProgress, TaskRecord, TaskRegistry, TaskSpec, TaskState, TrackedTask};
pub use spawn::{join_error_message, spawn, spawn_blocking};

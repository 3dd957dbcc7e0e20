use std::future::Future;
use std::sync::OnceLock;

use tokio::task::{JoinError, JoinHandle};

use crate::TaskClass;

fn runtime_handle() -> tokio::runtime::Handle {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return handle;
	}

	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("shelf-worker-global")
			.build()
			.expect("failed to build shelf-worker global tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task on the worker pool.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns blocking work on the worker pool's blocking threads.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	runtime_handle().spawn_blocking(f)
}

/// Describes why a worker task did not produce a value.
///
/// Panic payloads are extracted when they are `&str` or `String`.
pub fn join_error_message(err: JoinError) -> String {
	if err.is_cancelled() {
		return "task was aborted".to_string();
	}
	match err.try_into_panic() {
		Ok(payload) => {
			if let Some(s) = payload.downcast_ref::<&str>() {
				format!("task panicked: {s}")
			} else if let Some(s) = payload.downcast_ref::<String>() {
				format!("task panicked: {s}")
			} else {
				"task panicked".to_string()
			}
		}
		Err(_) => "task failed to join".to_string(),
	}
}

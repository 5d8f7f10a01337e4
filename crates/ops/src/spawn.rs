use std::any::Any;
use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::{JoinError, JoinHandle};

use crate::TaskClass;

const NON_STRING_PANIC: &str = "panic with non-string payload";

/// Single-worker runtime for submits issued from synchronous callers.
fn fallback_runtime() -> &'static Runtime {
	static FALLBACK: OnceLock<Runtime> = OnceLock::new();
	FALLBACK.get_or_init(|| {
		Builder::new_multi_thread()
			.enable_all()
			.worker_threads(1)
			.thread_name("tandem-ops-fallback")
			.build()
			.expect("failed to build tandem-ops fallback runtime")
	})
}

/// Spawns coordination work on the ambient tokio runtime.
///
/// Outside of a runtime context the task lands on a lazily built single-worker
/// fallback runtime, so fire-and-forget submits work from synchronous callers.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	let handle = Handle::try_current().unwrap_or_else(|_| fallback_runtime().handle().clone());
	tracing::trace!(worker_class = class.as_str(), "ops.spawn");
	handle.spawn(fut)
}

fn describe_panic(payload: &(dyn Any + Send)) -> String {
	payload
		.downcast_ref::<&'static str>()
		.map(|msg| (*msg).to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| NON_STRING_PANIC.to_string())
}

/// Extracts the panic message from a join error.
///
/// Returns `None` when the task was cancelled rather than panicking.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	err.try_into_panic().ok().map(|payload| describe_panic(&*payload))
}

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{JobId, JobQueue, QueueSnapshot, Remover};
use crate::config::QueueConfig;
use crate::{TaskClass, join_error_panic_message};

/// How one drained job settled. The drainer removes the entry in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobExit {
	Completed,
	Failed(String),
	Panicked(String),
	Cancelled,
}

impl JobExit {
	pub fn is_failure(&self) -> bool {
		!matches!(self, Self::Completed)
	}
}

#[derive(Debug, Default)]
struct DrainState {
	running: bool,
	/// Id of the most recently settled job. Snapshots still headed by it are
	/// ignored until the owner's removal lands.
	last_finished: Option<JobId>,
}

#[derive(Debug)]
struct DrainerInner {
	class: TaskClass,
	state: Mutex<DrainState>,
}

/// Runs the head of a caller-owned backlog, one job at a time.
///
/// The drainer never writes the backlog: it starts the head job when idle and,
/// once that job settles, asks the owner to remove it. The owner's next
/// revision re-invokes [`Self::on_queue_changed`], which continues the drain.
/// Cloning yields another handle sharing the same running flag.
#[derive(Debug, Clone)]
pub struct QueueDrainer {
	inner: Arc<DrainerInner>,
}

impl Default for QueueDrainer {
	fn default() -> Self {
		Self::new()
	}
}

impl QueueDrainer {
	pub fn new() -> Self {
		Self::with_config(&QueueConfig::default())
	}

	pub fn with_config(config: &QueueConfig) -> Self {
		Self {
			inner: Arc::new(DrainerInner {
				class: config.class,
				state: Mutex::new(DrainState::default()),
			}),
		}
	}

	/// Returns true while a job started by this drainer has not settled.
	pub fn is_running(&self) -> bool {
		self.inner.state.lock().running
	}

	/// Reacts to a new backlog revision. Safe to call redundantly.
	///
	/// Starts the head job when the backlog is non-empty and nothing is running,
	/// returning the handle of the spawned run.
	pub fn on_queue_changed(&self, queue: &QueueSnapshot, remove: &Remover) -> Option<JoinHandle<JobExit>> {
		let head = {
			let mut state = self.inner.state.lock();
			let head = queue.head()?;
			if state.running || state.last_finished == Some(head.id()) {
				return None;
			}
			state.running = true;
			head.clone()
		};

		let head_id = head.id();
		let class = self.inner.class;
		let inner = Arc::clone(&self.inner);
		let remove = remove.clone();
		tracing::trace!(job_id = %head_id, revision = queue.revision(), pending = queue.len(), "queue.job.start");

		Some(crate::spawn(class, async move {
			let exit = match crate::spawn(class, head.run()).await {
				Ok(Ok(())) => JobExit::Completed,
				Ok(Err(err)) => JobExit::Failed(format!("{err:#}")),
				Err(err) if err.is_cancelled() => JobExit::Cancelled,
				Err(err) => JobExit::Panicked(join_error_panic_message(err).unwrap_or_default()),
			};
			match &exit {
				JobExit::Completed => tracing::trace!(job_id = %head_id, "queue.job.done"),
				JobExit::Failed(reason) => tracing::warn!(job_id = %head_id, %reason, "queue.job.failed"),
				JobExit::Panicked(reason) => tracing::warn!(job_id = %head_id, %reason, "queue.job.panicked"),
				JobExit::Cancelled => tracing::warn!(job_id = %head_id, "queue.job.cancelled"),
			}

			{
				let mut state = inner.state.lock();
				state.last_finished = Some(head_id);
				state.running = false;
			}
			// The owner may re-enter on_queue_changed from inside remove.
			remove.remove(head_id);
			exit
		}))
	}

	/// Spawns a driver that feeds every revision of `queue` into [`Self::on_queue_changed`].
	pub fn attach(&self, queue: &JobQueue) -> DrainerHandle {
		let mut rx = queue.subscribe();
		let remover = queue.remover();
		let cancel = CancellationToken::new();
		let task_cancel = cancel.clone();
		let drainer = self.clone();
		let task = crate::spawn(self.inner.class, async move {
			loop {
				let snapshot = rx.borrow_and_update().clone();
				let _ = drainer.on_queue_changed(&snapshot, &remover);
				tokio::select! {
					biased;
					_ = task_cancel.cancelled() => break,
					changed = rx.changed() => {
						if changed.is_err() {
							break;
						}
					}
				}
			}
			tracing::trace!("queue.driver.stopped");
		});

		DrainerHandle {
			drainer: self.clone(),
			cancel,
			task,
		}
	}
}

/// Control handle for a driver spawned by [`QueueDrainer::attach`].
#[derive(Debug)]
pub struct DrainerHandle {
	drainer: QueueDrainer,
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl DrainerHandle {
	/// Stops observing the backlog. A job already running still settles and is removed.
	pub fn stop(&self) {
		self.cancel.cancel();
	}

	pub fn is_running(&self) -> bool {
		self.drainer.is_running()
	}

	/// Stops the driver and waits for it to exit.
	pub async fn shutdown(self) -> crate::Result<()> {
		self.stop();
		self.task.await?;
		Ok(())
	}
}

//! Caller-owned FIFO job backlog and its sequential drainer.
//!
//! [`JobQueue`] is the only writer of the backlog. Every mutation publishes a
//! new [`QueueSnapshot`] revision; [`QueueDrainer`] only observes snapshots and
//! asks for removal through a [`Remover`] once the head job settles.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use tokio::sync::watch;
use uuid::Uuid;

mod drainer;

pub use drainer::{DrainerHandle, JobExit, QueueDrainer};

/// Future produced by one job run. Errors are logged by the drainer and swallowed.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

type JobFn = dyn Fn() -> JobFuture + Send + Sync;

/// Unique identifier assigned to a job when it is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// One backlog entry: an id plus the opaque job it runs.
#[derive(Clone)]
pub struct QueueEntry {
	id: JobId,
	job: Arc<JobFn>,
}

impl QueueEntry {
	/// Creates an entry with a fresh id.
	pub fn new<F, Fut>(job: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		Self::with_id(JobId::new(), job)
	}

	pub fn with_id<F, Fut>(id: JobId, job: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		Self {
			id,
			job: Arc::new(move || -> JobFuture { Box::pin(job()) }),
		}
	}

	pub fn id(&self) -> JobId {
		self.id
	}

	pub(crate) fn run(&self) -> JobFuture {
		(self.job)()
	}
}

impl fmt::Debug for QueueEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("QueueEntry").field("id", &self.id).finish_non_exhaustive()
	}
}

/// Immutable view of the backlog at one revision.
///
/// A new revision is published for every owner mutation, including removals
/// of ids that were already gone.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
	revision: u64,
	entries: Arc<[QueueEntry]>,
}

impl QueueSnapshot {
	/// Builds a snapshot for owners that manage their own backlog storage.
	pub fn new(revision: u64, entries: impl Into<Arc<[QueueEntry]>>) -> Self {
		Self {
			revision,
			entries: entries.into(),
		}
	}

	pub fn revision(&self) -> u64 {
		self.revision
	}

	pub fn head(&self) -> Option<&QueueEntry> {
		self.entries.first()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn entries(&self) -> &[QueueEntry] {
		&self.entries
	}

	pub fn ids(&self) -> Vec<JobId> {
		self.entries.iter().map(QueueEntry::id).collect()
	}

	pub fn contains(&self, id: JobId) -> bool {
		self.entries.iter().any(|entry| entry.id == id)
	}

	fn with_entries(&self, entries: Vec<QueueEntry>) -> Self {
		Self {
			revision: self.revision.wrapping_add(1),
			entries: entries.into(),
		}
	}
}

/// Removal capability handed to the drainer.
///
/// Must tolerate ids that are no longer queued.
#[derive(Clone)]
pub struct Remover(Arc<dyn Fn(JobId) + Send + Sync>);

impl Remover {
	pub fn new(remove: impl Fn(JobId) + Send + Sync + 'static) -> Self {
		Self(Arc::new(remove))
	}

	pub fn remove(&self, id: JobId) {
		(self.0)(id);
	}
}

impl fmt::Debug for Remover {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Remover(..)")
	}
}

/// Owner-side FIFO backlog of async jobs.
///
/// Cloning yields another handle to the same backlog.
#[derive(Debug, Clone)]
pub struct JobQueue {
	tx: Arc<watch::Sender<QueueSnapshot>>,
}

impl Default for JobQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl JobQueue {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(QueueSnapshot::default());
		Self { tx: Arc::new(tx) }
	}

	/// Appends a job under a fresh id and returns that id.
	pub fn push_job<F, Fut>(&self, job: F) -> JobId
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
	{
		let entry = QueueEntry::new(job);
		let id = entry.id();
		self.tx.send_modify(|snapshot| {
			let mut entries = snapshot.entries.to_vec();
			entries.push(entry);
			*snapshot = snapshot.with_entries(entries);
		});
		tracing::trace!(job_id = %id, "queue.push");
		id
	}

	/// Appends a prebuilt entry. Returns false, leaving the backlog untouched,
	/// when an entry with the same id is already queued.
	pub fn push(&self, entry: QueueEntry) -> bool {
		let id = entry.id();
		let pushed = self.tx.send_if_modified(|snapshot| {
			if snapshot.contains(id) {
				return false;
			}
			let mut entries = snapshot.entries.to_vec();
			entries.push(entry);
			*snapshot = snapshot.with_entries(entries);
			true
		});
		if !pushed {
			tracing::warn!(job_id = %id, "queue.push.duplicate");
		}
		pushed
	}

	/// Removes the entry with `id` if present and publishes a new revision either way.
	///
	/// Returns whether an entry was removed.
	pub fn remove_by_id(&self, id: JobId) -> bool {
		let mut removed = false;
		self.tx.send_modify(|snapshot| {
			let entries: Vec<_> = snapshot.entries.iter().filter(|entry| entry.id != id).cloned().collect();
			removed = entries.len() != snapshot.len();
			*snapshot = snapshot.with_entries(entries);
		});
		tracing::trace!(job_id = %id, removed, "queue.remove");
		removed
	}

	/// Returns a removal capability that does not keep the backlog alive.
	pub fn remover(&self) -> Remover {
		let weak: Weak<watch::Sender<QueueSnapshot>> = Arc::downgrade(&self.tx);
		Remover::new(move |id| {
			if let Some(tx) = weak.upgrade() {
				JobQueue { tx }.remove_by_id(id);
			}
		})
	}

	pub fn snapshot(&self) -> QueueSnapshot {
		self.tx.borrow().clone()
	}

	pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
		self.tx.subscribe()
	}

	pub fn len(&self) -> usize {
		self.tx.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.tx.borrow().is_empty()
	}

	/// Resolves once the backlog is empty.
	pub async fn wait_empty(&self) {
		let mut rx = self.subscribe();
		let _ = rx.wait_for(QueueSnapshot::is_empty).await;
	}
}

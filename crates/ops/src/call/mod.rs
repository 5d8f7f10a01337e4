//! Single-flight request coordination.
//!
//! A [`CallCoordinator`] owns the lifecycle of one logical async operation.
//! Every invocation takes a fresh sequence token and the current reset epoch
//! when it starts; on settlement the result is accepted only if its token is
//! still the newest one and no reset happened in between. Everything else is
//! discarded without touching state or firing callbacks.
//!
//! Cancellation is logical: superseded operations still run to completion.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{CallConfig, OpsConfig};
use crate::outcome::{FieldErrors, Outcome};
use crate::token::SequenceClock;

mod state;

pub use state::CallState;
use state::{Control, Ticket};

type CallFuture<T> = Pin<Box<dyn Future<Output = Outcome<T>> + Send + 'static>>;
type CallFn<A, T> = dyn Fn(A) -> CallFuture<T> + Send + Sync;
type SuccessHandler<A, T> = Arc<dyn Fn(&T, &A) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&FieldErrors, &ErrorTextSetter) + Send + Sync>;

/// How one invocation's settlement was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
	/// The result was written to state and the matching callback fired.
	Accepted,
	/// A newer invocation started before this one settled.
	Superseded,
	/// The coordinator was reset or its key changed while this one was in flight.
	Invalidated,
}

impl Settlement {
	pub fn is_accepted(self) -> bool {
		self == Self::Accepted
	}
}

/// Helper handed to error handlers for annotating the coordinator's `error_text`.
#[derive(Clone)]
pub struct ErrorTextSetter {
	set: Arc<dyn Fn(String) + Send + Sync>,
}

impl ErrorTextSetter {
	pub fn set(&self, text: impl Into<String>) {
		(self.set)(text.into());
	}
}

impl fmt::Debug for ErrorTextSetter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ErrorTextSetter").finish_non_exhaustive()
	}
}

struct Inner<A, T, K> {
	call: Box<CallFn<A, T>>,
	config: CallConfig,
	fallback_message: String,
	clock: SequenceClock,
	control: Mutex<Control<K>>,
	/// Serializes acceptance with callback dispatch so callbacks observe acceptance order.
	dispatch: Mutex<()>,
	state: watch::Sender<CallState<T>>,
	on_success: Mutex<Option<SuccessHandler<A, T>>>,
	on_error: Mutex<Option<ErrorHandler>>,
}

/// Coordinates one logical async call, letting only the newest invocation win.
///
/// Cloning yields another handle to the same coordinator.
///
/// # Example
///
/// ```
/// use tandem_ops::{CallCoordinator, FieldErrors, Outcome};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let rename = CallCoordinator::keyed(7u32, |name: String| async move {
/// 	if name.is_empty() {
/// 		Outcome::Failure(FieldErrors::single("name", "Required"))
/// 	} else {
/// 		Outcome::Success(name.to_uppercase())
/// 	}
/// });
/// rename.on_error(|error, helpers| helpers.set(error.display("name")));
///
/// assert!(rename.run(String::new()).await.is_accepted());
/// assert_eq!(rename.state().error_text, "Required");
/// # }
/// ```
pub struct CallCoordinator<A, T, K = ()> {
	inner: Arc<Inner<A, T, K>>,
}

impl<A, T, K> Clone for CallCoordinator<A, T, K> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<A, T, K> fmt::Debug for CallCoordinator<A, T, K>
where
	K: fmt::Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let control = self.inner.control.lock();
		f.debug_struct("CallCoordinator")
			.field("sequence", &control.current.get())
			.field("epoch", &control.epoch)
			.field("key", &control.key)
			.field("is_fetching", &self.inner.state.borrow().is_fetching)
			.finish_non_exhaustive()
	}
}

impl<A, T> CallCoordinator<A, T>
where
	A: Clone + Send + Sync + 'static,
	T: Clone + Send + Sync + 'static,
{
	/// Creates an unkeyed coordinator with default settings.
	///
	/// Without a key there is nothing to clear on: key tracking is off, so
	/// [`Self::invalidate`] only records keys. [`Self::reset`] still applies.
	pub fn new<F, Fut>(call: F) -> Self
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Outcome<T>> + Send + 'static,
	{
		let mut config = OpsConfig::default();
		config.call.clear_on_key_change = false;
		Self::with_config(&config, None, call)
	}
}

impl<A, T, K> CallCoordinator<A, T, K>
where
	A: Clone + Send + Sync + 'static,
	T: Clone + Send + Sync + 'static,
	K: PartialEq + Clone + fmt::Debug + Send + Sync + 'static,
{
	/// Creates a coordinator whose state is tied to the invalidation `key`.
	pub fn keyed<F, Fut>(key: K, call: F) -> Self
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Outcome<T>> + Send + 'static,
	{
		Self::with_config(&OpsConfig::default(), Some(key), call)
	}

	/// Creates a coordinator from explicit configuration and an optional initial key.
	pub fn with_config<F, Fut>(config: &OpsConfig, key: Option<K>, call: F) -> Self
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Outcome<T>> + Send + 'static,
	{
		let call: Box<CallFn<A, T>> = Box::new(move |args: A| -> CallFuture<T> { Box::pin(call(args)) });
		let (state, _) = watch::channel(CallState::default());
		Self {
			inner: Arc::new(Inner {
				call,
				config: config.call.clone(),
				fallback_message: config.display.fallback().to_string(),
				clock: SequenceClock::new(),
				control: Mutex::new(Control::new(key)),
				dispatch: Mutex::new(()),
				state,
				on_success: Mutex::new(None),
				on_error: Mutex::new(None),
			}),
		}
	}

	/// Starts an invocation in the background.
	///
	/// Effects are observed through [`Self::state`] and the registered callbacks;
	/// the returned handle only reports how the settlement was treated.
	pub fn submit(&self, args: A) -> JoinHandle<Settlement> {
		let this = self.clone();
		crate::spawn(self.inner.config.class, async move { this.run(args).await })
	}

	/// Drives one invocation to settlement on the current task.
	pub async fn run(&self, args: A) -> Settlement {
		let ticket = self.begin();
		let outcome = (self.inner.call)(args.clone()).await;
		self.finish(ticket, outcome, &args)
	}

	fn begin(&self) -> Ticket {
		let mut control = self.inner.control.lock();
		let token = self.inner.clock.next();
		control.current = token;
		self.inner.state.send_modify(CallState::start);
		tracing::trace!(sequence = token.get(), epoch = control.epoch, "call.start");
		Ticket { token, epoch: control.epoch }
	}

	fn finish(&self, ticket: Ticket, outcome: Outcome<T>, args: &A) -> Settlement {
		let _dispatch = self.inner.dispatch.lock();
		let settlement = {
			let control = self.inner.control.lock();
			if control.epoch != ticket.epoch {
				Settlement::Invalidated
			} else if control.current != ticket.token {
				Settlement::Superseded
			} else {
				self.inner.state.send_modify(|state| state.settle(&outcome));
				Settlement::Accepted
			}
		};

		if !settlement.is_accepted() {
			tracing::debug!(sequence = ticket.token.get(), reason = ?settlement, "call.discard");
			return settlement;
		}

		tracing::trace!(sequence = ticket.token.get(), success = outcome.is_success(), "call.accept");
		match &outcome {
			Outcome::Success(payload) => {
				let handler = self.inner.on_success.lock().clone();
				if let Some(handler) = handler {
					handler(payload, args);
				}
			}
			Outcome::Failure(errors) => {
				let handler = self.inner.on_error.lock().clone();
				if let Some(handler) = handler {
					handler(errors, &self.error_text_setter());
				}
			}
		}
		settlement
	}

	/// Replaces the success handler. Only the last registration is kept.
	pub fn on_success(&self, handler: impl Fn(&T, &A) + Send + Sync + 'static) {
		*self.inner.on_success.lock() = Some(Arc::new(handler));
	}

	/// Replaces the error handler. Only the last registration is kept.
	pub fn on_error(&self, handler: impl Fn(&FieldErrors, &ErrorTextSetter) + Send + Sync + 'static) {
		*self.inner.on_error.lock() = Some(Arc::new(handler));
	}

	/// Returns a helper that writes `error_text` on this coordinator.
	pub fn error_text_setter(&self) -> ErrorTextSetter {
		let weak = Arc::downgrade(&self.inner);
		ErrorTextSetter {
			set: Arc::new(move |text: String| {
				if let Some(inner) = weak.upgrade() {
					inner.state.send_modify(|state| state.error_text = text);
				}
			}),
		}
	}

	/// Overwrites the stored error outside the submit flow.
	pub fn set_error(&self, error: Option<FieldErrors>) {
		self.inner.state.send_modify(|state| state.error = error);
	}

	/// Overwrites the free-form error annotation.
	pub fn set_error_text(&self, text: impl Into<String>) {
		let text = text.into();
		self.inner.state.send_modify(|state| state.error_text = text);
	}

	/// Restores the initial state and voids every in-flight invocation.
	pub fn reset(&self) {
		let mut control = self.inner.control.lock();
		self.reset_locked(&mut control);
	}

	fn reset_locked(&self, control: &mut Control<K>) {
		control.epoch = control.epoch.wrapping_add(1);
		self.inner.state.send_replace(CallState::default());
		tracing::debug!(epoch = control.epoch, key = ?control.key, "call.reset");
	}

	/// Records a new invalidation key.
	///
	/// When the key differs from the current one and clearing is enabled, the
	/// coordinator resets. Returns whether a reset happened.
	pub fn invalidate(&self, key: impl Into<Option<K>>) -> bool {
		let key = key.into();
		let mut control = self.inner.control.lock();
		if control.key == key {
			return false;
		}
		control.key = key;
		if !self.inner.config.clear_on_key_change {
			tracing::trace!(key = ?control.key, "call.key");
			return false;
		}
		self.reset_locked(&mut control);
		true
	}

	/// Returns the current invalidation key.
	pub fn key(&self) -> Option<K> {
		self.inner.control.lock().key.clone()
	}

	/// Returns the sequence id of the most recently started invocation, 0 if none.
	pub fn sequence(&self) -> u64 {
		self.inner.control.lock().current.get()
	}

	/// Returns a snapshot of the current state.
	pub fn state(&self) -> CallState<T> {
		self.inner.state.borrow().clone()
	}

	pub fn is_fetching(&self) -> bool {
		self.inner.state.borrow().is_fetching
	}

	/// Subscribes to state changes.
	pub fn subscribe(&self) -> watch::Receiver<CallState<T>> {
		self.inner.state.subscribe()
	}

	/// User-facing text for `field`, or an empty string when no error is stored.
	pub fn display_error(&self, field: &str) -> String {
		let state = self.inner.state.borrow();
		match &state.error {
			Some(error) => error.display_or(field, self.fallback_message()).to_string(),
			None => String::new(),
		}
	}
}

impl<A, T, K> CallCoordinator<A, T, K> {
	/// Fallback text used by [`Self::display_error`].
	pub fn fallback_message(&self) -> &str {
		&self.inner.fallback_message
	}
}

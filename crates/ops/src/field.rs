//! Lightweight submitter for a single form field.
//!
//! Unlike [`CallCoordinator`](crate::CallCoordinator) this keeps no sequence
//! tokens: every settlement is written, in settlement order. Use it where only
//! one submit can realistically be in flight.

use std::future::Future;
use std::pin::Pin;

use parking_lot::Mutex;

use crate::config::DisplayConfig;
use crate::outcome::{FieldErrors, Outcome};

type FieldFuture = Pin<Box<dyn Future<Output = Option<FieldErrors>> + Send + 'static>>;

#[derive(Debug, Default)]
struct FieldState {
	in_progress: bool,
	error: Option<FieldErrors>,
}

/// Tracks progress and the last error of one field-level operation.
pub struct AsyncField<A> {
	call: Box<dyn Fn(A) -> FieldFuture + Send + Sync>,
	fallback_message: String,
	state: Mutex<FieldState>,
}

impl<A> AsyncField<A>
where
	A: Send + 'static,
{
	/// Wraps an operation; its success payload is ignored.
	pub fn new<F, Fut, T>(call: F) -> Self
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Outcome<T>> + Send + 'static,
		T: Send + 'static,
	{
		Self::with_display(&DisplayConfig::default(), call)
	}

	pub fn with_display<F, Fut, T>(display: &DisplayConfig, call: F) -> Self
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Outcome<T>> + Send + 'static,
		T: Send + 'static,
	{
		let call = move |args: A| -> FieldFuture {
			let fut = call(args);
			Box::pin(async move { fut.await.error().cloned() })
		};
		Self {
			call: Box::new(call),
			fallback_message: display.fallback().to_string(),
			state: Mutex::new(FieldState::default()),
		}
	}

	/// Runs the operation and records its error, clearing it on success.
	pub async fn submit(&self, args: A) {
		self.state.lock().in_progress = true;
		let error = (self.call)(args).await;
		tracing::trace!(failed = error.is_some(), "field.settle");
		let mut state = self.state.lock();
		state.in_progress = false;
		state.error = error;
	}

	pub fn in_progress(&self) -> bool {
		self.state.lock().in_progress
	}

	pub fn error(&self) -> Option<FieldErrors> {
		self.state.lock().error.clone()
	}

	/// Text for `field`: empty without an error, otherwise the display fallback chain.
	pub fn display_error(&self, field: &str) -> String {
		match &self.state.lock().error {
			Some(error) => error.display_or(field, &self.fallback_message).to_string(),
			None => String::new(),
		}
	}
}

#[cfg(test)]
mod tests {
	use tokio::sync::oneshot;

	use super::*;

	fn validate(name: String) -> impl Future<Output = Outcome<()>> + Send {
		async move {
			if name.len() > 5 {
				Outcome::Failure(FieldErrors::single("lastName", "Too long"))
			} else {
				Outcome::Success(())
			}
		}
	}

	#[tokio::test]
	async fn records_and_clears_errors() {
		let field = AsyncField::new(validate);
		assert_eq!(field.display_error("firstName"), "");

		field.submit("Bartholomew".to_string()).await;
		assert!(!field.in_progress());
		assert_eq!(field.display_error("firstName"), "Too long");
		assert_eq!(field.display_error("lastName"), "Too long");

		field.submit("Bart".to_string()).await;
		assert_eq!(field.error(), None);
		assert_eq!(field.display_error("lastName"), "");
	}

	#[tokio::test]
	async fn in_progress_while_pending() {
		let (tx, rx) = oneshot::channel::<Outcome<()>>();
		let rx = Mutex::new(Some(rx));
		let field = AsyncField::new(move |_: ()| {
			let rx = rx.lock().take();
			async move {
				match rx {
					Some(rx) => rx.await.unwrap_or(Outcome::Success(())),
					None => Outcome::Success(()),
				}
			}
		});

		let submit = field.submit(());
		let check = async {
			tokio::task::yield_now().await;
			let pending = field.in_progress();
			let _ = tx.send(Outcome::Failure(FieldErrors::new()));
			pending
		};
		let ((), pending) = tokio::join!(submit, check);
		assert!(pending);
		assert!(!field.in_progress());
		assert_eq!(field.display_error("x"), "An error occurred");
	}

	#[tokio::test]
	async fn custom_fallback() {
		let display = DisplayConfig {
			fallback_message: "Nope".to_string(),
		};
		let field = AsyncField::with_display(&display, |_: ()| async { Outcome::<()>::Failure(FieldErrors::new()) });
		field.submit(()).await;
		assert_eq!(field.display_error("x"), "Nope");
	}

	#[tokio::test]
	async fn blank_fallback_never_shows_empty_text() {
		let display = DisplayConfig {
			fallback_message: String::new(),
		};
		let field = AsyncField::with_display(&display, |_: ()| async { Outcome::<()>::Failure(FieldErrors::single("name", "  ")) });
		field.submit(()).await;
		assert_eq!(field.display_error("name"), "An error occurred");
	}
}

use crate::outcome::{FieldErrors, Outcome};
use crate::token::SequenceToken;

/// Observable state of one [`CallCoordinator`](super::CallCoordinator).
///
/// `error` and `last_payload` are only ever written together by one accepted
/// settlement. `error_text` is a free annotation set by error handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallState<T> {
	/// True between start and acceptance (or voiding) of the newest invocation.
	pub is_fetching: bool,
	/// Error of the last accepted settlement.
	pub error: Option<FieldErrors>,
	/// Caller-provided message, cleared by every accepted settlement.
	pub error_text: String,
	/// Payload of the last accepted settlement.
	pub last_payload: Option<T>,
	/// Number of accepted successful settlements since the last reset.
	pub success_count: u64,
}

impl<T> Default for CallState<T> {
	fn default() -> Self {
		Self {
			is_fetching: false,
			error: None,
			error_text: String::new(),
			last_payload: None,
			success_count: 0,
		}
	}
}

impl<T> CallState<T> {
	/// Returns true once a failure has been accepted and not yet cleared.
	pub fn has_error(&self) -> bool {
		self.error.is_some()
	}

	pub(super) fn start(&mut self) {
		self.is_fetching = true;
	}

	/// Applies one accepted settlement.
	pub(super) fn settle(&mut self, outcome: &Outcome<T>)
	where
		T: Clone,
	{
		self.is_fetching = false;
		self.error_text.clear();
		match outcome {
			Outcome::Success(payload) => {
				self.last_payload = Some(payload.clone());
				self.error = None;
				self.success_count = self.success_count.wrapping_add(1);
			}
			Outcome::Failure(errors) => {
				self.last_payload = None;
				self.error = Some(errors.clone());
			}
		}
	}
}

/// Supersession bookkeeping guarded together with state writes.
#[derive(Debug)]
pub(super) struct Control<K> {
	/// Token of the most recently started invocation.
	pub current: SequenceToken,
	/// Bumped by every reset; invocations started in an older epoch are void.
	pub epoch: u64,
	pub key: Option<K>,
}

impl<K> Control<K> {
	pub fn new(key: Option<K>) -> Self {
		Self {
			current: SequenceToken::default(),
			epoch: 0,
			key,
		}
	}
}

/// Ticket captured when an invocation starts.
#[derive(Debug, Clone, Copy)]
pub(super) struct Ticket {
	pub token: SequenceToken,
	pub epoch: u64,
}

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic sequence clock handing out invocation tokens.
#[derive(Debug, Default, Clone)]
pub(crate) struct SequenceClock {
	next: Arc<AtomicU64>,
}

impl SequenceClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a fresh token; the first token issued is 1.
	pub fn next(&self) -> SequenceToken {
		SequenceToken(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}

/// Identifies one coordinator invocation. Zero means "nothing started yet".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SequenceToken(u64);

impl SequenceToken {
	pub const fn get(self) -> u64 {
		self.0
	}
}

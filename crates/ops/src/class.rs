use serde::Deserialize;

/// Execution class attached to spawned coordination work for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
	/// Work whose result is waited on by an interactive surface (submits).
	Interactive,
	/// Backlog work that may trail user input (queued jobs).
	Background,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Interactive => "interactive",
			Self::Background => "background",
		}
	}
}

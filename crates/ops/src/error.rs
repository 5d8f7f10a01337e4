//! Error types for coordination plumbing.
//!
//! Operation failures are never reported through [`Error`]; they are data carried
//! by [`Outcome::Failure`](crate::Outcome::Failure).

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by configuration loading and task supervision.
#[derive(Debug, Error)]
pub enum Error {
	/// Error parsing TOML configuration.
	#[error("config parse error: {0}")]
	Config(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// A spawned coordination task panicked or was aborted.
	#[error("coordination task failed: {0}")]
	Join(String),
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		let message = if err.is_cancelled() {
			"cancelled".to_string()
		} else {
			crate::join_error_panic_message(err).unwrap_or_else(|| "unknown join failure".to_string())
		};
		Self::Join(message)
	}
}

/// Result type for coordination plumbing.
pub type Result<T> = std::result::Result<T, Error>;

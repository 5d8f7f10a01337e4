//! Runtime configuration for coordinators and drainers.

use std::path::Path;

use serde::Deserialize;

use crate::outcome::DEFAULT_ERROR_MESSAGE;
use crate::{Error, Result, TaskClass};

/// Top-level configuration, usually loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpsConfig {
	pub call: CallConfig,
	pub queue: QueueConfig,
	pub display: DisplayConfig,
}

/// Settings for [`CallCoordinator`](crate::CallCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallConfig {
	/// Class used when `submit` spawns an invocation.
	pub class: TaskClass,
	/// When false, `invalidate` only records the key: no reset, no voiding.
	pub clear_on_key_change: bool,
}

impl Default for CallConfig {
	fn default() -> Self {
		Self {
			class: TaskClass::Interactive,
			clear_on_key_change: true,
		}
	}
}

/// Settings for [`QueueDrainer`](crate::QueueDrainer).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
	/// Class used for drained jobs and the driver task.
	pub class: TaskClass,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self { class: TaskClass::Background }
	}
}

/// Settings for user-facing error text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
	pub fallback_message: String,
}

impl Default for DisplayConfig {
	fn default() -> Self {
		Self {
			fallback_message: DEFAULT_ERROR_MESSAGE.to_string(),
		}
	}
}

impl DisplayConfig {
	/// Configured fallback text, or [`DEFAULT_ERROR_MESSAGE`] when it is blank.
	pub fn fallback(&self) -> &str {
		if self.fallback_message.trim().is_empty() { DEFAULT_ERROR_MESSAGE } else { &self.fallback_message }
	}
}

impl OpsConfig {
	/// Parses configuration from TOML text. Missing sections take defaults.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a TOML configuration file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| Error::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::from_toml_str(&text)?;
		tracing::debug!(path = %path.display(), "ops.config.loaded");
		Ok(config)
	}
}

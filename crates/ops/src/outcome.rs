//! Tagged operation results and the structured, field-keyed error payload.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Message shown when an error carries no usable text.
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// Settled result of one injected operation.
///
/// Exactly one of payload or error exists per settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
	Success(T),
	Failure(FieldErrors),
}

impl<T> Outcome<T> {
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success(_))
	}

	pub fn payload(&self) -> Option<&T> {
		match self {
			Self::Success(payload) => Some(payload),
			Self::Failure(_) => None,
		}
	}

	pub fn error(&self) -> Option<&FieldErrors> {
		match self {
			Self::Success(_) => None,
			Self::Failure(errors) => Some(errors),
		}
	}

	pub fn into_result(self) -> std::result::Result<T, FieldErrors> {
		match self {
			Self::Success(payload) => Ok(payload),
			Self::Failure(errors) => Err(errors),
		}
	}
}

impl<T> From<std::result::Result<T, FieldErrors>> for Outcome<T> {
	fn from(result: std::result::Result<T, FieldErrors>) -> Self {
		match result {
			Ok(payload) => Self::Success(payload),
			Err(errors) => Self::Failure(errors),
		}
	}
}

/// Field name to message mapping reported by a failed operation.
///
/// Insertion order is preserved; "first message" always means the first field
/// the operation reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, String>);

impl FieldErrors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a mapping holding a single field message.
	pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
		let mut errors = Self::new();
		errors.insert(field, message);
		errors
	}

	/// Sets the message for `field`, keeping its original position when replaced.
	pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) -> Option<String> {
		self.0.insert(field.into(), message.into())
	}

	pub fn get(&self, field: &str) -> Option<&str> {
		self.0.get(field).map(String::as_str)
	}

	pub fn first(&self) -> Option<(&str, &str)> {
		self.0.first().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// User-facing text for `field` using [`DEFAULT_ERROR_MESSAGE`] as last resort.
	pub fn display(&self, field: &str) -> &str {
		self.display_or(field, DEFAULT_ERROR_MESSAGE)
	}

	/// User-facing text for `field`.
	///
	/// Resolution order: the field's own message, then the first message in the
	/// mapping, then `fallback`. Blank messages are skipped at every step.
	pub fn display_or<'a>(&'a self, field: &str, fallback: &'a str) -> &'a str {
		let usable = |msg: &&str| !msg.trim().is_empty();
		self.get(field)
			.filter(usable)
			.or_else(|| self.0.values().map(String::as_str).find(usable))
			.unwrap_or(fallback)
	}
}

impl<K, V> FromIterator<(K, V)> for FieldErrors
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

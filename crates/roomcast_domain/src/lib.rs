#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

/// Opaque per-connection identifier, assigned by the server at accept time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(String);

impl ConnId {
	/// Create a non-empty `ConnId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	/// Generate a fresh random connection id.
	pub fn generate() -> Self {
		Self(uuid::Uuid::new_v4().to_string())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for ConnId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for ConnId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ConnId::new(s.to_string())
	}
}

/// Caller-supplied room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
	/// Create a non-empty `RoomId`.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		if id.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(id))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for RoomId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		RoomId::new(s.to_string())
	}
}

/// Perspective tag on call lifecycle events: the initiator sees `Me`,
/// everyone else in the room sees `Them`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
	Me,
	Them,
}

impl CallRole {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallRole::Me => "me",
			CallRole::Them => "them",
		}
	}
}

impl fmt::Display for CallRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conn_id_parse_and_display() {
		let id = "abc-123".parse::<ConnId>().unwrap();
		assert_eq!(id.as_str(), "abc-123");
		assert_eq!(id.to_string(), "abc-123");
	}

	#[test]
	fn generated_conn_ids_are_unique() {
		let a = ConnId::generate();
		let b = ConnId::generate();
		assert_ne!(a, b);
		assert!(!a.as_str().is_empty());
	}

	#[test]
	fn rejects_empty_ids() {
		assert!(ConnId::new("").is_err());
		assert!(RoomId::new("   ").is_err());
		assert!("".parse::<RoomId>().is_err());
	}

	#[test]
	fn room_id_roundtrip() {
		let room = RoomId::new("abc").unwrap();
		assert_eq!(room.as_str(), "abc");
		assert_eq!(room.clone().into_string(), "abc");
	}

	#[test]
	fn call_role_serializes_lowercase() {
		assert_eq!(CallRole::Me.as_str(), "me");
		assert_eq!(CallRole::Them.to_string(), "them");
	}
}

#![forbid(unsafe_code)]

use thiserror::Error;

/// Failure taxonomy for relay operations. Every variant is recovered at the
/// originating connection: the failed operation leaves relay state untouched
/// and the reason is echoed back as an `error` event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
	/// Structural validation failure: missing, empty, or oversized field.
	#[error("{0}")]
	Validation(String),

	/// The operation requires room membership, or an existing room, that is
	/// absent.
	#[error("{0}")]
	State(String),

	/// Join rejected: the target room already holds the maximum number of
	/// members.
	#[error("Room is full (max {capacity} users)")]
	Capacity { capacity: usize },
}

impl RelayError {
	pub fn missing_field(field: &str) -> Self {
		RelayError::Validation(format!("Missing required field: {field}"))
	}

	pub fn not_in_room() -> Self {
		RelayError::State("User not in a room".to_string())
	}

	pub fn room_not_found() -> Self {
		RelayError::State("Room does not exist".to_string())
	}

	pub fn invalid_room_id() -> Self {
		RelayError::Validation("Invalid room ID format".to_string())
	}

	pub fn message_too_long(max: usize) -> Self {
		RelayError::Validation(format!("Message too long (max {max} characters)"))
	}
}

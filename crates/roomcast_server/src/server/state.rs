#![forbid(unsafe_code)]

use crate::server::registry::ConnectionRegistry;
use crate::server::rooms::RoomTable;

/// Shared relay state: the connection registry and the room table, mutated
/// together under one lock so every logical operation observes a consistent
/// snapshot.
#[derive(Debug, Default)]
pub struct RelayState {
	pub registry: ConnectionRegistry,
	pub rooms: RoomTable,
}

impl RelayState {
	pub fn new() -> Self {
		Self::default()
	}
}

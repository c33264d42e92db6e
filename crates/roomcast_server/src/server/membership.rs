#![forbid(unsafe_code)]

use roomcast_domain::{ConnId, RoomId};

use crate::server::error::RelayError;
use crate::server::state::RelayState;

/// Result of a successful join: who to notify and what to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
	pub room_id: RoomId,
	/// Member count after the join, reported back to the joiner.
	pub user_count: usize,
	/// Existing members to notify with `user-connected`.
	pub peers: Vec<ConnId>,
	/// The previous room, if leaving it dropped its membership to zero and
	/// it is now eligible for deferred deletion.
	pub vacated: Option<RoomId>,
}

/// Result of a disconnect cleanup for a connection that was in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectOutcome {
	pub room_id: RoomId,
	/// Remaining members to notify with `user-disconnected`.
	pub peers: Vec<ConnId>,
	/// The room is empty and eligible for deferred deletion.
	pub now_empty: bool,
}

/// Move a connection into `room_id`, implicitly leaving its current room.
///
/// The capacity check runs before any mutation: a rejected join leaves both
/// the registry and every member set exactly as they were.
pub fn join(
	state: &mut RelayState,
	conn_id: &ConnId,
	room_id: &str,
	capacity: usize,
	now: i64,
) -> Result<JoinOutcome, RelayError> {
	let target = RoomId::new(room_id).map_err(|_| RelayError::invalid_room_id())?;

	if !state.registry.contains(conn_id) {
		return Err(RelayError::State("Unknown connection".to_string()));
	}

	if let Some(room) = state.rooms.get(&target)
		&& room.member_count() >= capacity
	{
		return Err(RelayError::Capacity { capacity });
	}

	let previous = state.registry.current_room(conn_id).cloned();

	// Transport-level leave of the prior room: no application broadcast,
	// but an emptied room becomes eligible for deferred deletion.
	let mut vacated = None;
	if let Some(old) = previous
		&& old != target
		&& let Some(old_room) = state.rooms.get_mut(&old)
	{
		old_room.remove_member(conn_id);
		if old_room.is_empty() {
			vacated = Some(old);
		}
	}

	let room = state.rooms.get_or_create(target.clone(), now);
	let peers = room.peers_of(conn_id);
	room.add_member(conn_id.clone());
	let user_count = room.member_count();

	state.registry.set_room(conn_id, target.clone());

	Ok(JoinOutcome {
		room_id: target,
		user_count,
		peers,
		vacated,
	})
}

/// Remove a disconnecting connection from the registry and, if it was in a
/// room, from that room's member set.
pub fn disconnect(state: &mut RelayState, conn_id: &ConnId) -> Option<DisconnectOutcome> {
	let room_id = state.registry.current_room(conn_id).cloned();
	state.registry.remove(conn_id);

	let room_id = room_id?;
	let room = state.rooms.get_mut(&room_id)?;
	room.remove_member(conn_id);

	Some(DisconnectOutcome {
		peers: room.peers_of(conn_id),
		now_empty: room.is_empty(),
		room_id,
	})
}

#![forbid(unsafe_code)]

use roomcast_domain::{CallRole, ConnId, RoomId};
use roomcast_protocol::{ChatPayload, ClientEvent, EditPayload, ImagePayload, ReadPayload, ServerEvent};
use serde_json::Value;

use crate::server::error::RelayError;
use crate::server::rooms::ReceiptRecord;
use crate::server::state::RelayState;

/// Maximum length for chat and edited text.
pub const MAX_TEXT_LEN: usize = 1000;

/// One outbound emission produced by routing an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
	pub to: ConnId,
	pub event: ServerEvent,
}

fn require(field: &str, value: &str) -> Result<(), RelayError> {
	if value.is_empty() {
		return Err(RelayError::missing_field(field));
	}
	Ok(())
}

fn require_payload(field: &str, value: &Value) -> Result<(), RelayError> {
	if value.is_null() {
		return Err(RelayError::missing_field(field));
	}
	Ok(())
}

fn check_text_len(text: &str) -> Result<(), RelayError> {
	if text.chars().count() > MAX_TEXT_LEN {
		return Err(RelayError::message_too_long(MAX_TEXT_LEN));
	}
	Ok(())
}

/// The room the sender currently occupies; required for events without an
/// explicit room id.
fn tracked_room<'a>(state: &'a RelayState, sender: &ConnId) -> Result<&'a RoomId, RelayError> {
	state.registry.current_room(sender).ok_or_else(RelayError::not_in_room)
}

/// Parse a caller-supplied room id field. Events carrying one trust it;
/// the sender does not have to be a member of that room.
fn explicit_room(room_id: &str) -> Result<RoomId, RelayError> {
	require("roomId", room_id)?;
	RoomId::new(room_id).map_err(|_| RelayError::invalid_room_id())
}

/// Validate an inbound application event and resolve it into deliveries.
///
/// Only the pending-receipt path mutates `state`; every error return leaves
/// it untouched.
pub fn route(
	state: &mut RelayState,
	sender: &ConnId,
	event: &ClientEvent,
	now: i64,
) -> Result<Vec<Delivery>, RelayError> {
	match event {
		ClientEvent::SendMessage(payload) => route_chat(state, sender, payload),
		ClientEvent::Image(payload) => route_image(state, sender, payload),
		ClientEvent::MessageRead(payload) => route_read(state, sender, payload),
		ClientEvent::EditMessage(payload) => route_edit(state, sender, payload, now),
		ClientEvent::AudioCallStart { room_id } => route_call(state, sender, room_id, true, now),
		ClientEvent::AudioCallEnd { room_id } => route_call(state, sender, room_id, false, now),
		ClientEvent::AudioOffer { room_id, offer } => {
			route_signal(state, sender, room_id, "offer", offer, |offer, from| ServerEvent::AudioOffer {
				offer,
				from,
			})
		}
		ClientEvent::AudioAnswer { room_id, answer } => {
			route_signal(state, sender, room_id, "answer", answer, |answer, from| {
				ServerEvent::AudioAnswer { answer, from }
			})
		}
		ClientEvent::IceCandidate { room_id, candidate } => {
			route_signal(state, sender, room_id, "candidate", candidate, |candidate, from| {
				ServerEvent::IceCandidate { candidate, from }
			})
		}
		// Handshake and membership events are dispatched before routing.
		ClientEvent::Hello { .. } | ClientEvent::JoinRoom(_) => {
			Err(RelayError::State("Unexpected control event".to_string()))
		}
	}
}

fn route_chat(state: &RelayState, sender: &ConnId, payload: &ChatPayload) -> Result<Vec<Delivery>, RelayError> {
	require("id", &payload.id)?;
	require("text", &payload.text)?;
	check_text_len(&payload.text)?;

	let room_id = tracked_room(state, sender)?;
	let room = state.rooms.get(room_id).ok_or_else(RelayError::room_not_found)?;

	Ok(room
		.peers_of(sender)
		.into_iter()
		.map(|to| Delivery {
			to,
			event: ServerEvent::ChatMessage {
				id: payload.id.clone(),
				text: payload.text.clone(),
				timestamp: payload.timestamp,
				sender: sender.clone(),
			},
		})
		.collect())
}

fn route_image(state: &RelayState, sender: &ConnId, payload: &ImagePayload) -> Result<Vec<Delivery>, RelayError> {
	require("id", &payload.id)?;

	let room_id = tracked_room(state, sender)?;
	let room = state.rooms.get(room_id).ok_or_else(RelayError::room_not_found)?;

	Ok(room
		.peers_of(sender)
		.into_iter()
		.map(|to| Delivery {
			to,
			event: ServerEvent::ReceiveImage {
				id: payload.id.clone(),
				img_data: payload.data.clone(),
				timestamp: payload.timestamp,
				sender: sender.clone(),
			},
		})
		.collect())
}

/// Read receipts go to each other member individually; an unreachable
/// member's receipt is buffered in the room instead of being dropped.
fn route_read(state: &mut RelayState, sender: &ConnId, payload: &ReadPayload) -> Result<Vec<Delivery>, RelayError> {
	require("messageId", &payload.message_id)?;

	let room_id = tracked_room(state, sender)?.clone();

	let RelayState { registry, rooms } = state;
	let room = rooms.get_mut(&room_id).ok_or_else(RelayError::room_not_found)?;

	let mut deliveries = Vec::new();
	for member in room.peers_of(sender) {
		if registry.is_reachable(&member) {
			deliveries.push(Delivery {
				to: member,
				event: ServerEvent::MessageRead {
					message_id: payload.message_id.clone(),
					timestamp: payload.timestamp,
					reader_id: sender.clone(),
				},
			});
		} else {
			metrics::counter!("roomcast_server_pending_receipts_total").increment(1);
			room.push_pending_receipt(
				member,
				ReceiptRecord {
					message_id: payload.message_id.clone(),
					timestamp: payload.timestamp,
					reader: sender.clone(),
				},
			);
		}
	}

	Ok(deliveries)
}

fn route_edit(
	state: &RelayState,
	sender: &ConnId,
	payload: &EditPayload,
	now: i64,
) -> Result<Vec<Delivery>, RelayError> {
	require("messageId", &payload.message_id)?;
	require("newText", &payload.new_text)?;
	check_text_len(&payload.new_text)?;
	let room_id = explicit_room(&payload.room_id)?;

	// An absent room is an empty scope, not an error.
	let Some(room) = state.rooms.get(&room_id) else {
		return Ok(Vec::new());
	};

	Ok(room
		.peers_of(sender)
		.into_iter()
		.map(|to| Delivery {
			to,
			event: ServerEvent::MessageEdited {
				message_id: payload.message_id.clone(),
				new_text: payload.new_text.clone(),
				timestamp: now,
			},
		})
		.collect())
}

/// Call lifecycle: broadcast to the room with role `them`, echo to the
/// initiator with role `me`.
fn route_call(
	state: &RelayState,
	sender: &ConnId,
	room_id: &str,
	starting: bool,
	now: i64,
) -> Result<Vec<Delivery>, RelayError> {
	let room_id = explicit_room(room_id)?;

	let event = |role: CallRole| {
		if starting {
			ServerEvent::AudioCallStarted {
				user_id: sender.clone(),
				started_by: role,
				timestamp: now,
			}
		} else {
			ServerEvent::AudioCallEnded {
				user_id: sender.clone(),
				ended_by: role,
				timestamp: now,
			}
		}
	};

	let mut deliveries: Vec<Delivery> = state
		.rooms
		.get(&room_id)
		.map(|room| room.peers_of(sender))
		.unwrap_or_default()
		.into_iter()
		.map(|to| Delivery {
			to,
			event: event(CallRole::Them),
		})
		.collect();

	deliveries.push(Delivery {
		to: sender.clone(),
		event: event(CallRole::Me),
	});

	Ok(deliveries)
}

fn route_signal(
	state: &RelayState,
	sender: &ConnId,
	room_id: &str,
	payload_field: &str,
	payload: &Value,
	build: impl Fn(Value, ConnId) -> ServerEvent,
) -> Result<Vec<Delivery>, RelayError> {
	require_payload(payload_field, payload)?;
	let room_id = explicit_room(room_id)?;

	let Some(room) = state.rooms.get(&room_id) else {
		return Ok(Vec::new());
	};

	Ok(room
		.peers_of(sender)
		.into_iter()
		.map(|to| Delivery {
			to,
			event: build(payload.clone(), sender.clone()),
		})
		.collect())
}

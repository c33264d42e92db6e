#![forbid(unsafe_code)]

use roomcast_domain::{CallRole, ConnId, RoomId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat message payload as supplied by the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
	pub id: String,
	pub text: String,
	pub timestamp: i64,
}

/// Image payload. `data` is relayed opaquely; the server never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
	pub id: String,
	pub timestamp: i64,
	#[serde(default)]
	pub data: Value,
}

/// Read-receipt payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPayload {
	pub message_id: String,
	pub timestamp: i64,
}

/// Message-edit payload. Carries an explicit room id instead of relying on
/// the sender's tracked room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPayload {
	pub message_id: String,
	pub new_text: String,
	pub room_id: String,
}

/// Events a client pushes to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
	/// Connection handshake; must be the first event on a new connection.
	Hello {
		origin: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		client_name: Option<String>,
	},

	/// Join (or create) a room. The payload is the bare room id.
	JoinRoom(String),

	SendMessage(ChatPayload),

	Image(ImagePayload),

	MessageRead(ReadPayload),

	EditMessage(EditPayload),

	AudioCallStart {
		room_id: String,
	},
	AudioCallEnd {
		room_id: String,
	},

	AudioOffer {
		room_id: String,
		offer: Value,
	},
	AudioAnswer {
		room_id: String,
		answer: Value,
	},
	IceCandidate {
		room_id: String,
		candidate: Value,
	},
}

impl ClientEvent {
	/// Wire name of the event, used to tag `error` responses.
	pub const fn name(&self) -> &'static str {
		match self {
			ClientEvent::Hello { .. } => "hello",
			ClientEvent::JoinRoom(_) => "join-room",
			ClientEvent::SendMessage(_) => "send-message",
			ClientEvent::Image(_) => "image",
			ClientEvent::MessageRead(_) => "message-read",
			ClientEvent::EditMessage(_) => "edit-message",
			ClientEvent::AudioCallStart { .. } => "audio-call-start",
			ClientEvent::AudioCallEnd { .. } => "audio-call-end",
			ClientEvent::AudioOffer { .. } => "audio-offer",
			ClientEvent::AudioAnswer { .. } => "audio-answer",
			ClientEvent::IceCandidate { .. } => "ice-candidate",
		}
	}
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
	/// Handshake acknowledgment carrying the server-assigned connection id.
	Welcome {
		conn_id: ConnId,
		server_time_ms: i64,
		max_frame_bytes: u64,
	},

	RoomJoined {
		room_id: RoomId,
		user_count: usize,
	},

	/// A peer joined the room. The payload is the peer's connection id.
	UserConnected(ConnId),

	/// A peer left the room. The payload is the peer's connection id.
	UserDisconnected(ConnId),

	ChatMessage {
		id: String,
		text: String,
		timestamp: i64,
		sender: ConnId,
	},

	ReceiveImage {
		id: String,
		img_data: Value,
		timestamp: i64,
		sender: ConnId,
	},

	MessageRead {
		message_id: String,
		timestamp: i64,
		reader_id: ConnId,
	},

	MessageEdited {
		message_id: String,
		new_text: String,
		timestamp: i64,
	},

	AudioCallStarted {
		user_id: ConnId,
		started_by: CallRole,
		timestamp: i64,
	},
	AudioCallEnded {
		user_id: ConnId,
		ended_by: CallRole,
		timestamp: i64,
	},

	AudioOffer {
		offer: Value,
		from: ConnId,
	},
	AudioAnswer {
		answer: Value,
		from: ConnId,
	},
	IceCandidate {
		candidate: Value,
		from: ConnId,
	},

	/// Operation failure, reported only to the originating connection.
	Error {
		#[serde(rename = "type")]
		kind: String,
		message: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		room_id: Option<String>,
	},
}

#![forbid(unsafe_code)]

use std::collections::HashMap;

use roomcast_domain::{ConnId, RoomId};
use roomcast_protocol::ServerEvent;
use tokio::sync::mpsc;

/// Outbound push channel for one connection.
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// Room association of a connection, modeled as an explicit state rather
/// than a nullable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnState {
	Unjoined,
	InRoom(RoomId),
}

#[derive(Debug)]
struct ConnEntry {
	state: ConnState,
	tx: OutboundSender,
}

/// Maps live connection ids to their room assignment and outbound channel.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
	conns: HashMap<ConnId, ConnEntry>,
}

impl ConnectionRegistry {
	/// Register a fresh connection with no room assignment.
	pub fn insert(&mut self, conn_id: ConnId, tx: OutboundSender) {
		self.conns.insert(
			conn_id,
			ConnEntry {
				state: ConnState::Unjoined,
				tx,
			},
		);
	}

	/// Remove all trace of a connection. Returns whether it was present.
	pub fn remove(&mut self, conn_id: &ConnId) -> bool {
		self.conns.remove(conn_id).is_some()
	}

	pub fn contains(&self, conn_id: &ConnId) -> bool {
		self.conns.contains_key(conn_id)
	}

	/// Current room assignment, if joined.
	pub fn current_room(&self, conn_id: &ConnId) -> Option<&RoomId> {
		match self.conns.get(conn_id).map(|e| &e.state) {
			Some(ConnState::InRoom(room)) => Some(room),
			_ => None,
		}
	}

	pub fn set_room(&mut self, conn_id: &ConnId, room: RoomId) {
		if let Some(entry) = self.conns.get_mut(conn_id) {
			entry.state = ConnState::InRoom(room);
		}
	}

	/// Outbound sender for a connection, if registered.
	pub fn sender(&self, conn_id: &ConnId) -> Option<&OutboundSender> {
		self.conns.get(conn_id).map(|e| &e.tx)
	}

	/// A connection is reachable while it is registered and its outbound
	/// channel has a live receiver.
	pub fn is_reachable(&self, conn_id: &ConnId) -> bool {
		self.conns.get(conn_id).is_some_and(|e| !e.tx.is_closed())
	}

	pub fn len(&self) -> usize {
		self.conns.len()
	}
}

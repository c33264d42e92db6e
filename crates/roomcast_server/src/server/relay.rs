#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use roomcast_domain::{ConnId, RoomId};
use roomcast_protocol::{ClientEvent, ServerEvent};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::server::state::RelayState;
use crate::server::{membership, router};
use crate::util::time::unix_ms;

/// Configuration for [`Relay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
	/// Maximum members per room.
	pub room_capacity: usize,

	/// Grace window between a room emptying and its deletion; a rejoin
	/// within the window keeps the room alive.
	pub empty_room_grace: Duration,

	/// Maximum number of queued outbound events per connection.
	pub outbound_queue_capacity: usize,

	pub debug_logs: bool,
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			room_capacity: 10,
			empty_room_grace: Duration::from_secs(5),
			outbound_queue_capacity: 1024,
			debug_logs: false,
		}
	}
}

/// Live counts reported by the health endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
	pub connections: usize,
	pub rooms: usize,
	pub pending_receipts: usize,
}

/// The relay core: connection registry, room table, and fan-out engine
/// behind a single lock. Each logical operation (connect, join, route,
/// disconnect) holds the lock start to finish, so no two mutations ever
/// interleave.
#[derive(Debug, Clone)]
pub struct Relay {
	inner: Arc<Mutex<RelayState>>,
	cfg: RelayConfig,
}

impl Relay {
	pub fn new(cfg: RelayConfig) -> Self {
		Self {
			inner: Arc::new(Mutex::new(RelayState::new())),
			cfg,
		}
	}

	/// Register a connection and hand back its outbound event stream.
	pub async fn connect(&self, conn_id: ConnId) -> mpsc::Receiver<ServerEvent> {
		let (tx, rx) = mpsc::channel(self.cfg.outbound_queue_capacity);

		let mut state = self.inner.lock().await;
		state.registry.insert(conn_id.clone(), tx);

		info!(conn = %conn_id, "user connected");
		metrics::gauge!("roomcast_server_active_connections").increment(1.0);

		rx
	}

	/// Disconnect cleanup: leave the current room, notify remaining peers,
	/// and schedule deletion of an emptied room.
	pub async fn disconnect(&self, conn_id: &ConnId) {
		let mut state = self.inner.lock().await;
		let outcome = membership::disconnect(&mut state, conn_id);
		metrics::gauge!("roomcast_server_active_connections").decrement(1.0);

		let Some(outcome) = outcome else {
			info!(conn = %conn_id, "user disconnected");
			return;
		};

		info!(
			conn = %conn_id,
			room = %outcome.room_id,
			remaining = outcome.peers.len(),
			"user disconnected"
		);

		for peer in &outcome.peers {
			Self::deliver(&state, &self.cfg, peer, ServerEvent::UserDisconnected(conn_id.clone()));
		}

		if outcome.now_empty {
			self.schedule_room_sweep(outcome.room_id);
		}
	}

	/// Process one inbound application event from `conn_id`.
	pub async fn handle_event(&self, conn_id: &ConnId, event: ClientEvent) {
		metrics::counter!("roomcast_server_events_in_total").increment(1);

		match event {
			ClientEvent::Hello { .. } => {
				let state = self.inner.lock().await;
				Self::deliver(
					&state,
					&self.cfg,
					conn_id,
					ServerEvent::Error {
						kind: "hello".to_string(),
						message: "Handshake already completed".to_string(),
						room_id: None,
					},
				);
			}
			ClientEvent::JoinRoom(room_id) => self.join_room(conn_id, &room_id).await,
			other => self.route(conn_id, other).await,
		}
	}

	async fn join_room(&self, conn_id: &ConnId, room_id: &str) {
		let mut state = self.inner.lock().await;
		let room_existed = RoomId::new(room_id).is_ok_and(|id| state.rooms.contains(&id));

		match membership::join(&mut state, conn_id, room_id, self.cfg.room_capacity, unix_ms()) {
			Ok(outcome) => {
				if !room_existed {
					info!(room = %outcome.room_id, "room created");
					metrics::counter!("roomcast_server_rooms_created_total").increment(1);
				}
				info!(
					conn = %conn_id,
					room = %outcome.room_id,
					users = outcome.user_count,
					"joined room"
				);

				for peer in &outcome.peers {
					Self::deliver(&state, &self.cfg, peer, ServerEvent::UserConnected(conn_id.clone()));
				}
				Self::deliver(
					&state,
					&self.cfg,
					conn_id,
					ServerEvent::RoomJoined {
						room_id: outcome.room_id,
						user_count: outcome.user_count,
					},
				);

				if let Some(vacated) = outcome.vacated {
					self.schedule_room_sweep(vacated);
				}
			}
			Err(err) => {
				warn!(conn = %conn_id, room = %room_id, error = %err, "join-room rejected");
				metrics::counter!("roomcast_server_event_errors_total").increment(1);
				Self::deliver(
					&state,
					&self.cfg,
					conn_id,
					ServerEvent::Error {
						kind: "join-room".to_string(),
						message: err.to_string(),
						room_id: Some(room_id.to_string()),
					},
				);
			}
		}
	}

	async fn route(&self, conn_id: &ConnId, event: ClientEvent) {
		let name = event.name();
		let mut state = self.inner.lock().await;

		match router::route(&mut state, conn_id, &event, unix_ms()) {
			Ok(deliveries) => {
				if self.cfg.debug_logs {
					debug!(conn = %conn_id, event = name, recipients = deliveries.len(), "routing event");
				}
				metrics::counter!("roomcast_server_events_routed_total").increment(deliveries.len() as u64);

				for delivery in deliveries {
					Self::deliver(&state, &self.cfg, &delivery.to, delivery.event);
				}
			}
			Err(err) => {
				warn!(conn = %conn_id, event = name, error = %err, "event rejected");
				metrics::counter!("roomcast_server_event_errors_total").increment(1);
				Self::deliver(
					&state,
					&self.cfg,
					conn_id,
					ServerEvent::Error {
						kind: name.to_string(),
						message: err.to_string(),
						room_id: None,
					},
				);
			}
		}
	}

	/// Fire-and-forget outbound push. A full queue drops the event; a
	/// closed or missing recipient is skipped silently.
	fn deliver(state: &RelayState, cfg: &RelayConfig, to: &ConnId, event: ServerEvent) {
		let Some(tx) = state.registry.sender(to) else {
			return;
		};

		match tx.try_send(event) {
			Ok(()) => {}
			Err(mpsc::error::TrySendError::Full(_)) => {
				metrics::counter!("roomcast_server_events_dropped_total").increment(1);
				if cfg.debug_logs {
					debug!(conn = %to, "outbound queue full; event dropped");
				}
			}
			Err(mpsc::error::TrySendError::Closed(_)) => {}
		}
	}

	/// Deferred teardown of an emptied room: sleep out the grace window,
	/// then re-validate that the room still exists and is still empty
	/// before deleting it. A rejoin during the window makes the re-check
	/// fail, which is the cancellation.
	fn schedule_room_sweep(&self, room_id: RoomId) {
		let inner = Arc::clone(&self.inner);
		let grace = self.cfg.empty_room_grace;

		tokio::spawn(async move {
			tokio::time::sleep(grace).await;

			let mut state = inner.lock().await;
			let still_empty = state.rooms.get(&room_id).is_some_and(|room| room.is_empty());
			if still_empty {
				state.rooms.remove(&room_id);
				info!(room = %room_id, "room deleted (empty)");
				metrics::counter!("roomcast_server_rooms_deleted_total").increment(1);
			}
		});
	}

	pub async fn stats(&self) -> RelayStats {
		let state = self.inner.lock().await;
		RelayStats {
			connections: state.registry.len(),
			rooms: state.rooms.len(),
			pending_receipts: state.rooms.pending_receipt_total(),
		}
	}

	/// Pending receipts buffered in `room_id` for `recipient`; observability
	/// and test hook, there is no delivery path out of the buffer.
	#[allow(dead_code)]
	pub async fn pending_receipts(&self, room_id: &RoomId, recipient: &ConnId) -> usize {
		let state = self.inner.lock().await;
		state
			.rooms
			.get(room_id)
			.map_or(0, |room| room.pending_receipts_for(recipient).len())
	}
}

#![forbid(unsafe_code)]

use std::time::Duration;

use roomcast_domain::{ConnId, RoomId};
use roomcast_protocol::{ChatPayload, ClientEvent, ReadPayload, ServerEvent};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use crate::server::relay::{Relay, RelayConfig};

fn conn(id: &str) -> ConnId {
	ConnId::new(id).expect("valid ConnId")
}

fn room(id: &str) -> RoomId {
	RoomId::new(id).expect("valid RoomId")
}

fn test_config() -> RelayConfig {
	RelayConfig {
		room_capacity: 10,
		empty_room_grace: Duration::from_millis(50),
		outbound_queue_capacity: 16,
		debug_logs: false,
	}
}

async fn join(relay: &Relay, id: &ConnId, room_id: &str) {
	relay.handle_event(id, ClientEvent::JoinRoom(room_id.to_string())).await;
}

async fn recv_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
	timeout(Duration::from_millis(250), rx.recv())
		.await
		.expect("expected an event within timeout")
		.expect("channel open")
}

async fn assert_silent(rx: &mut mpsc::Receiver<ServerEvent>) {
	let got = timeout(Duration::from_millis(50), rx.recv()).await;
	assert!(got.is_err(), "expected no event, got: {got:?}");
}

#[tokio::test]
async fn chat_roundtrip_between_two_connections() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let c2 = conn("c2");

	let mut rx1 = relay.connect(c1.clone()).await;
	let mut rx2 = relay.connect(c2.clone()).await;

	join(&relay, &c1, "abc").await;
	match recv_event(&mut rx1).await {
		ServerEvent::RoomJoined { room_id, user_count } => {
			assert_eq!(room_id, room("abc"));
			assert_eq!(user_count, 1);
		}
		other => panic!("expected RoomJoined, got {other:?}"),
	}

	join(&relay, &c2, "abc").await;
	match recv_event(&mut rx1).await {
		ServerEvent::UserConnected(id) => assert_eq!(id, c2),
		other => panic!("expected UserConnected, got {other:?}"),
	}
	match recv_event(&mut rx2).await {
		ServerEvent::RoomJoined { user_count, .. } => assert_eq!(user_count, 2),
		other => panic!("expected RoomJoined, got {other:?}"),
	}

	relay
		.handle_event(
			&c1,
			ClientEvent::SendMessage(ChatPayload {
				id: "1".to_string(),
				text: "hi".to_string(),
				timestamp: 1_700_000_000_000,
			}),
		)
		.await;

	match recv_event(&mut rx2).await {
		ServerEvent::ChatMessage { id, text, timestamp, sender } => {
			assert_eq!(id, "1");
			assert_eq!(text, "hi");
			assert_eq!(timestamp, 1_700_000_000_000);
			assert_eq!(sender, c1);
		}
		other => panic!("expected ChatMessage, got {other:?}"),
	}

	// The sender never hears its own message.
	assert_silent(&mut rx1).await;
}

#[tokio::test]
async fn chat_while_unjoined_yields_scoped_state_error() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let mut rx1 = relay.connect(c1.clone()).await;

	relay
		.handle_event(
			&c1,
			ClientEvent::SendMessage(ChatPayload {
				id: "1".to_string(),
				text: "hi".to_string(),
				timestamp: 7,
			}),
		)
		.await;

	match recv_event(&mut rx1).await {
		ServerEvent::Error { kind, message, room_id } => {
			assert_eq!(kind, "send-message");
			assert_eq!(message, "User not in a room");
			assert!(room_id.is_none());
		}
		other => panic!("expected Error, got {other:?}"),
	}
}

#[tokio::test]
async fn capacity_rejection_is_reported_to_the_joiner_only() {
	let relay = Relay::new(RelayConfig {
		room_capacity: 2,
		..test_config()
	});
	let c1 = conn("c1");
	let c2 = conn("c2");
	let c3 = conn("c3");

	let mut rx1 = relay.connect(c1.clone()).await;
	let mut rx2 = relay.connect(c2.clone()).await;
	let mut rx3 = relay.connect(c3.clone()).await;

	join(&relay, &c1, "abc").await;
	join(&relay, &c2, "abc").await;
	let _ = recv_event(&mut rx1).await; // room-joined
	let _ = recv_event(&mut rx1).await; // user-connected c2
	let _ = recv_event(&mut rx2).await; // room-joined

	join(&relay, &c3, "abc").await;
	match recv_event(&mut rx3).await {
		ServerEvent::Error { kind, message, room_id } => {
			assert_eq!(kind, "join-room");
			assert_eq!(message, "Room is full (max 2 users)");
			assert_eq!(room_id.as_deref(), Some("abc"));
		}
		other => panic!("expected Error, got {other:?}"),
	}

	assert_silent(&mut rx1).await;
	assert_silent(&mut rx2).await;
}

#[tokio::test]
async fn empty_room_is_deleted_only_after_the_grace_window() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let mut rx1 = relay.connect(c1.clone()).await;

	join(&relay, &c1, "abc").await;
	let _ = recv_event(&mut rx1).await;
	assert_eq!(relay.stats().await.rooms, 1);

	relay.disconnect(&c1).await;

	// Still present inside the grace window.
	assert_eq!(relay.stats().await.rooms, 1);

	sleep(Duration::from_millis(200)).await;
	assert_eq!(relay.stats().await.rooms, 0);
}

#[tokio::test]
async fn rejoin_within_the_grace_window_cancels_deletion() {
	let relay = Relay::new(RelayConfig {
		empty_room_grace: Duration::from_millis(150),
		..test_config()
	});
	let c1 = conn("c1");
	let c2 = conn("c2");

	let mut rx1 = relay.connect(c1.clone()).await;
	join(&relay, &c1, "abc").await;
	let _ = recv_event(&mut rx1).await;

	relay.disconnect(&c1).await;

	// Repopulate before the timer fires.
	let mut rx2 = relay.connect(c2.clone()).await;
	join(&relay, &c2, "abc").await;
	let _ = recv_event(&mut rx2).await;

	sleep(Duration::from_millis(300)).await;
	let stats = relay.stats().await;
	assert_eq!(stats.rooms, 1, "room must survive the stale deletion timer");
}

#[tokio::test]
async fn receipt_for_disconnected_reader_is_buffered() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let c2 = conn("c2");

	let mut rx1 = relay.connect(c1.clone()).await;
	let rx2 = relay.connect(c2.clone()).await;

	join(&relay, &c1, "abc").await;
	join(&relay, &c2, "abc").await;
	let _ = recv_event(&mut rx1).await; // room-joined
	let _ = recv_event(&mut rx1).await; // user-connected c2

	// c2's receiver goes away without a disconnect having been processed
	// yet; it is still a member but no longer reachable.
	drop(rx2);

	relay
		.handle_event(
			&c1,
			ClientEvent::MessageRead(ReadPayload {
				message_id: "m1".to_string(),
				timestamp: 11,
			}),
		)
		.await;

	assert_eq!(relay.pending_receipts(&room("abc"), &c2).await, 1);
	assert_silent(&mut rx1).await;
}

#[tokio::test]
async fn validation_failure_never_reaches_peers() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let c2 = conn("c2");

	let mut rx1 = relay.connect(c1.clone()).await;
	let mut rx2 = relay.connect(c2.clone()).await;

	join(&relay, &c1, "abc").await;
	join(&relay, &c2, "abc").await;
	let _ = recv_event(&mut rx1).await;
	let _ = recv_event(&mut rx1).await;
	let _ = recv_event(&mut rx2).await;

	relay
		.handle_event(
			&c1,
			ClientEvent::SendMessage(ChatPayload {
				id: "1".to_string(),
				text: "x".repeat(1001),
				timestamp: 7,
			}),
		)
		.await;

	match recv_event(&mut rx1).await {
		ServerEvent::Error { kind, .. } => assert_eq!(kind, "send-message"),
		other => panic!("expected Error, got {other:?}"),
	}
	assert_silent(&mut rx2).await;
}

#[tokio::test]
async fn disconnect_notifies_remaining_members() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let c2 = conn("c2");

	let mut rx1 = relay.connect(c1.clone()).await;
	let mut rx2 = relay.connect(c2.clone()).await;

	join(&relay, &c1, "abc").await;
	join(&relay, &c2, "abc").await;
	let _ = recv_event(&mut rx1).await;
	let _ = recv_event(&mut rx1).await;
	let _ = recv_event(&mut rx2).await;

	relay.disconnect(&c2).await;

	match recv_event(&mut rx1).await {
		ServerEvent::UserDisconnected(id) => assert_eq!(id, c2),
		other => panic!("expected UserDisconnected, got {other:?}"),
	}

	let stats = relay.stats().await;
	assert_eq!(stats.connections, 1);
}

#[tokio::test]
async fn repeated_hello_is_rejected_without_side_effects() {
	let relay = Relay::new(test_config());
	let c1 = conn("c1");
	let mut rx1 = relay.connect(c1.clone()).await;

	relay
		.handle_event(
			&c1,
			ClientEvent::Hello {
				origin: "http://localhost:5173".to_string(),
				client_name: None,
			},
		)
		.await;

	match recv_event(&mut rx1).await {
		ServerEvent::Error { kind, .. } => assert_eq!(kind, "hello"),
		other => panic!("expected Error, got {other:?}"),
	}
	assert_eq!(relay.stats().await.rooms, 0);
}

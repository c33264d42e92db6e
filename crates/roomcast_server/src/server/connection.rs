#![forbid(unsafe_code)]

use anyhow::{Context as _, anyhow};
use bytes::BytesMut;
use roomcast_domain::ConnId;
use roomcast_protocol::{ClientEvent, FramingError, ServerEvent, try_decode_frame_from_buffer};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::server::relay::Relay;
use crate::util::time::unix_ms;

/// Per-connection server settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
	/// Maximum single-frame payload size; sized for inline image payloads.
	pub max_frame_bytes: usize,

	/// Origins allowed to establish connections. Empty means allow all
	/// (development posture).
	pub allowed_origins: Vec<String>,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			max_frame_bytes: roomcast_protocol::DEFAULT_MAX_FRAME_SIZE,
			allowed_origins: Vec::new(),
		}
	}
}

/// Drive one client connection: handshake, then relay inbound events and
/// drain outbound pushes until either side goes away.
pub async fn handle_connection(
	conn_id: ConnId,
	connection: quinn::Connection,
	relay: Relay,
	settings: ConnectionSettings,
) -> anyhow::Result<()> {
	let (mut send, mut recv) = connection.accept_bi().await.context("accept bidirectional stream")?;

	let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ClientEvent>();
	let max_frame_bytes = settings.max_frame_bytes;

	let reader_conn = conn_id.clone();
	let reader_task = tokio::spawn(async move {
		let mut buf = BytesMut::with_capacity(16 * 1024);
		let mut tmp = [0u8; 8192];

		loop {
			let n = match recv.read(&mut tmp).await {
				Ok(Some(n)) => n,
				Ok(None) => return Ok::<(), anyhow::Error>(()),
				Err(e) => return Err(anyhow!(e).context("stream read failed")),
			};

			metrics::counter!("roomcast_server_bytes_in_total").increment(n as u64);
			buf.extend_from_slice(&tmp[..n]);

			loop {
				match try_decode_frame_from_buffer::<ClientEvent>(&mut buf, max_frame_bytes) {
					Ok(Some(event)) => {
						if event_tx.send(event).is_err() {
							return Ok(());
						}
					}
					Ok(None) => break,
					Err(e @ FramingError::FrameTooLarge { .. }) => {
						metrics::counter!("roomcast_server_decode_errors_total").increment(1);
						return Err(anyhow!(e).context("inbound frame rejected"));
					}
					Err(e) => {
						metrics::counter!("roomcast_server_decode_errors_total").increment(1);
						warn!(conn = %reader_conn, error = %e, "failed to decode inbound frame");
						return Err(anyhow!(e).context("failed to decode inbound frame"));
					}
				}
			}
		}
	});

	// The first event must be the handshake; the origin allow-list is the
	// only admission control.
	let origin = match wait_for_hello(&mut event_rx).await {
		Ok((origin, client_name)) => {
			info!(conn = %conn_id, origin = %origin, client_name = client_name.as_deref().unwrap_or(""), "received hello");
			origin
		}
		Err(e) => {
			send_event(
				&mut send,
				&ServerEvent::Error {
					kind: "hello".to_string(),
					message: e.to_string(),
					room_id: None,
				},
				max_frame_bytes,
			)
			.await
			.ok();
			reader_task.abort();
			return Err(e);
		}
	};

	if !settings.allowed_origins.is_empty() && !settings.allowed_origins.iter().any(|o| o == &origin) {
		warn!(conn = %conn_id, origin = %origin, "origin not allowed");
		metrics::counter!("roomcast_server_origin_rejected_total").increment(1);
		send_event(
			&mut send,
			&ServerEvent::Error {
				kind: "hello".to_string(),
				message: "Origin not allowed".to_string(),
				room_id: None,
			},
			max_frame_bytes,
		)
		.await
		.ok();
		reader_task.abort();
		return Ok(());
	}

	send_event(
		&mut send,
		&ServerEvent::Welcome {
			conn_id: conn_id.clone(),
			server_time_ms: unix_ms(),
			max_frame_bytes: max_frame_bytes as u64,
		},
		max_frame_bytes,
	)
	.await
	.context("send welcome")?;

	let mut outbound_rx = relay.connect(conn_id.clone()).await;

	let result = loop {
		tokio::select! {
			inbound = event_rx.recv() => match inbound {
				Some(event) => relay.handle_event(&conn_id, event).await,
				None => break Ok(()),
			},
			outbound = outbound_rx.recv() => match outbound {
				Some(event) => {
					if let Err(e) = send_event(&mut send, &event, max_frame_bytes).await {
						break Err(e.context("outbound write failed"));
					}
				}
				None => break Ok(()),
			},
		}
	};

	relay.disconnect(&conn_id).await;
	reader_task.abort();
	debug!(conn = %conn_id, "connection handler finished");

	result
}

async fn wait_for_hello(
	rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
) -> anyhow::Result<(String, Option<String>)> {
	match rx.recv().await {
		Some(ClientEvent::Hello { origin, client_name }) => Ok((origin, client_name)),
		Some(other) => Err(anyhow!("expected hello, got {}", other.name())),
		None => Err(anyhow!("connection closed before hello")),
	}
}

async fn send_event(
	send: &mut quinn::SendStream,
	event: &ServerEvent,
	max_frame_bytes: usize,
) -> anyhow::Result<()> {
	let frame = roomcast_protocol::encode_frame(event, max_frame_bytes)?;
	send.write_all(&frame).await.context("write frame")?;
	metrics::counter!("roomcast_server_bytes_out_total").increment(frame.len() as u64);
	Ok(())
}

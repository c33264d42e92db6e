#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use roomcast_domain::{ConnId, RoomId};

/// A read acknowledgment buffered for a recipient that was unreachable at
/// relay time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRecord {
	pub message_id: String,
	pub timestamp: i64,
	pub reader: ConnId,
}

/// One named room: its member set and the per-recipient queue of
/// undelivered read receipts.
#[derive(Debug)]
pub struct Room {
	/// Creation stamp (unix ms). Recorded on first join; diagnostics only.
	#[allow(dead_code)]
	pub created_at: i64,
	members: HashSet<ConnId>,
	pending_receipts: HashMap<ConnId, Vec<ReceiptRecord>>,
}

impl Room {
	fn new(now: i64) -> Self {
		Self {
			created_at: now,
			members: HashSet::new(),
			pending_receipts: HashMap::new(),
		}
	}

	/// Members other than `conn_id`, the broadcast scope for most events.
	pub fn peers_of(&self, conn_id: &ConnId) -> Vec<ConnId> {
		self.members.iter().filter(|m| *m != conn_id).cloned().collect()
	}

	pub fn member_count(&self) -> usize {
		self.members.len()
	}

	#[allow(dead_code)]
	pub fn has_member(&self, conn_id: &ConnId) -> bool {
		self.members.contains(conn_id)
	}

	pub fn add_member(&mut self, conn_id: ConnId) -> bool {
		self.members.insert(conn_id)
	}

	pub fn remove_member(&mut self, conn_id: &ConnId) -> bool {
		self.members.remove(conn_id)
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	/// Queue a receipt for a recipient that could not be reached. The buffer
	/// is append-only; nothing drains it (see DESIGN.md).
	pub fn push_pending_receipt(&mut self, recipient: ConnId, record: ReceiptRecord) {
		self.pending_receipts.entry(recipient).or_default().push(record);
	}

	pub fn pending_receipts_for(&self, recipient: &ConnId) -> &[ReceiptRecord] {
		self.pending_receipts.get(recipient).map_or(&[], Vec::as_slice)
	}

	pub fn pending_receipt_count(&self) -> usize {
		self.pending_receipts.values().map(Vec::len).sum()
	}
}

/// Owns every live room, keyed by room id.
#[derive(Debug, Default)]
pub struct RoomTable {
	rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
	/// Look up a room, creating it with an empty member set and the given
	/// creation time if absent. Idempotent.
	pub fn get_or_create(&mut self, room_id: RoomId, now: i64) -> &mut Room {
		self.rooms.entry(room_id).or_insert_with(|| Room::new(now))
	}

	pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
		self.rooms.get(room_id)
	}

	pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
		self.rooms.get_mut(room_id)
	}

	/// Remove a room unconditionally. Callers re-validate emptiness first.
	pub fn remove(&mut self, room_id: &RoomId) -> bool {
		self.rooms.remove(room_id).is_some()
	}

	pub fn contains(&self, room_id: &RoomId) -> bool {
		self.rooms.contains_key(room_id)
	}

	pub fn len(&self) -> usize {
		self.rooms.len()
	}

	pub fn pending_receipt_total(&self) -> usize {
		self.rooms.values().map(Room::pending_receipt_count).sum()
	}
}

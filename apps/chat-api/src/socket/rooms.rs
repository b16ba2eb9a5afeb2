//! Room membership registry and broadcast primitive.
//!
//! Owns the only shared mutable state of the real-time layer: the mapping
//! from room key to member connections and its inverse. Both maps live under
//! one mutex so every membership mutation is atomic relative to every other
//! room operation. Room keys come in two kinds: a chat id (one room per
//! conversation) and a user id (one room per identity, reaching all of that
//! user's open connections).

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use super::events::ServerFrame;

/// Per-connection bookkeeping held by the registry.
struct ConnectionEntry {
    /// The authenticated user this connection belongs to.
    user_id: String,
    /// Outbound queue of serialized frames, drained by the connection's
    /// event loop.
    sender: UnboundedSender<String>,
    /// Every room this connection is currently a member of, including its
    /// own user-room.
    rooms: HashSet<String>,
}

struct RegistryInner {
    rooms: HashMap<String, HashSet<String>>,
    connections: HashMap<String, ConnectionEntry>,
}

/// Shared registry of all live connections and their room memberships.
///
/// External write-paths (REST handlers, after a committed mutation) only ever
/// call [`RoomRegistry::emit`]; membership is mutated solely through the
/// register/join/leave/unregister operations driven by the socket layer.
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                rooms: HashMap::new(),
                connections: HashMap::new(),
            }),
        }
    }

    /// Register a freshly authenticated connection and join it to its
    /// user-room. Must be called exactly once per connection, before any
    /// other room operation for it.
    pub fn register(&self, conn_id: &str, user_id: &str, sender: UnboundedSender<String>) {
        let mut inner = self.inner.lock();
        inner.connections.insert(
            conn_id.to_string(),
            ConnectionEntry {
                user_id: user_id.to_string(),
                sender,
                rooms: HashSet::new(),
            },
        );
        join_room(&mut inner, conn_id, user_id);
    }

    /// Join a connection to a chat room. Idempotent; unknown connections are
    /// ignored.
    pub fn join(&self, conn_id: &str, room: &str) {
        let mut inner = self.inner.lock();
        if !inner.connections.contains_key(conn_id) {
            return;
        }
        join_room(&mut inner, conn_id, room);
    }

    /// Remove a connection from a chat room. No-op if it is not a member.
    /// A connection never leaves its own user-room while registered.
    pub fn leave(&self, conn_id: &str, room: &str) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.connections.get_mut(conn_id) else {
            return;
        };
        if entry.user_id == room {
            return;
        }
        if !entry.rooms.remove(room) {
            return;
        }
        remove_member(&mut inner.rooms, room, conn_id);
    }

    /// Remove a connection from every room and drop its outbound sender.
    /// Called synchronously when the connection's event loop exits, so no
    /// frame can be delivered to it afterwards.
    pub fn unregister(&self, conn_id: &str) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.connections.remove(conn_id) else {
            return;
        };
        for room in &entry.rooms {
            remove_member(&mut inner.rooms, room, conn_id);
        }
    }

    /// Broadcast an event to every connection currently in the room.
    ///
    /// This is the emit-to-target primitive used by the REST layer after a
    /// persisted write. Fire-and-forget: rooms with no members and receivers
    /// that are gone are silently skipped.
    pub fn emit(&self, room: &str, event: &str, payload: Value) {
        self.emit_inner(room, None, event, payload);
    }

    /// Broadcast to every member of the room except one connection. Used for
    /// typing relays so the sender never sees its own indicator.
    pub fn emit_except(&self, room: &str, except_conn: &str, event: &str, payload: Value) {
        self.emit_inner(room, Some(except_conn), event, payload);
    }

    fn emit_inner(&self, room: &str, except_conn: Option<&str>, event: &str, payload: Value) {
        let frame = ServerFrame::new(event, payload).to_json();
        let inner = self.inner.lock();
        let Some(members) = inner.rooms.get(room) else {
            return;
        };
        for conn_id in members {
            if except_conn == Some(conn_id.as_str()) {
                continue;
            }
            if let Some(entry) = inner.connections.get(conn_id) {
                // send() fails only if the receiver is gone; drop silently.
                let _ = entry.sender.send(frame.clone());
            }
        }
    }

    /// Number of connections currently in the room. Zero for absent rooms.
    pub fn room_size(&self, room: &str) -> usize {
        self.inner.lock().rooms.get(room).map_or(0, HashSet::len)
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// Number of rooms the connection is a member of. Zero if unknown.
    pub fn membership_count(&self, conn_id: &str) -> usize {
        self.inner
            .lock()
            .connections
            .get(conn_id)
            .map_or(0, |e| e.rooms.len())
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn join_room(inner: &mut RegistryInner, conn_id: &str, room: &str) {
    if let Some(entry) = inner.connections.get_mut(conn_id) {
        entry.rooms.insert(room.to_string());
    }
    inner
        .rooms
        .entry(room.to_string())
        .or_default()
        .insert(conn_id.to_string());
}

fn remove_member(rooms: &mut HashMap<String, HashSet<String>>, room: &str, conn_id: &str) {
    if let Some(members) = rooms.get_mut(room) {
        members.remove(conn_id);
        // A room ceases to exist when its last member leaves.
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}

//! Room-scoped message relay.
//!
//! Every connected socket owns a bounded outbound channel of `Frame`s.
//! Rooms are sets of socket ids; relaying enumerates the sender's room under
//! one read lock and pushes to each member's channel. The relay holds no game
//! state and never interprets payloads beyond shot validation.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use puttlink::{Frame, PayloadError, RelayEvent, RelaySection, validate_shot_payload};

pub type SocketId = u64;

/// Outbound frames for one socket.
pub type FrameRx = mpsc::Receiver<Frame>;

#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    RoomNotFound(String),
    UnknownEvent(String),
    InvalidPayload(PayloadError),
    NotInRoom,
    UnknownSocket,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound(id) if id.is_empty() => write!(f, "no room id given"),
            Self::RoomNotFound(id) => write!(f, "room '{id}' not found"),
            Self::UnknownEvent(name) => write!(f, "event '{name}' is not relayed"),
            Self::InvalidPayload(e) => write!(f, "invalid payload: {e}"),
            Self::NotInRoom => write!(f, "socket has not joined a room"),
            Self::UnknownSocket => write!(f, "unknown socket"),
        }
    }
}

impl std::error::Error for RelayError {}

/// Result of a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomListing {
    /// Live room ids, sorted.
    pub rooms: Vec<String>,
    /// Rooms removed by this listing.
    pub evicted: Vec<String>,
}

struct Room {
    created_at: Instant,
    members: HashSet<SocketId>,
}

struct Socket {
    tx: mpsc::Sender<Frame>,
    room: Option<String>,
}

#[derive(Default)]
struct Directory {
    rooms: HashMap<String, Room>,
    sockets: HashMap<SocketId, Socket>,
}

impl Directory {
    /// Remove `socket` from its room. Returns the room and its remaining size.
    fn leave(&mut self, socket: SocketId) -> Option<(String, usize)> {
        let room_id = self.sockets.get_mut(&socket)?.room.take()?;
        let room = self.rooms.get_mut(&room_id)?;
        let removed = room.members.remove(&socket);
        debug_assert!(removed, "socket {socket} indexed to {room_id} but not a member");
        Some((room_id, room.members.len()))
    }
}

pub struct SessionRelay {
    game_type: String,
    room_ttl: Duration,
    socket_queue: usize,
    next_socket: AtomicU64,
    inner: RwLock<Directory>,
}

impl SessionRelay {
    pub fn new(section: &RelaySection) -> Self {
        Self {
            game_type: section.game_type.clone(),
            room_ttl: Duration::from_secs(section.room_ttl_secs),
            socket_queue: section.socket_queue.max(1),
            next_socket: AtomicU64::new(1),
            inner: RwLock::new(Directory::default()),
        }
    }

    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    /// Register a new socket and hand back its outbound stream.
    pub fn connect(&self) -> (SocketId, FrameRx) {
        let id = self.next_socket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.socket_queue);
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .sockets
            .insert(id, Socket { tx, room: None });
        (id, rx)
    }

    /// Leave the current room and drop the socket's channel.
    pub fn disconnect(&self, socket: SocketId) -> Option<(String, usize)> {
        let mut dir = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let left = dir.leave(socket);
        dir.sockets.remove(&socket);
        left
    }

    // ----- Rooms -----

    /// New empty room with an 8-hex-char id.
    pub fn create_room(&self) -> String {
        self.create_room_at(Instant::now())
    }

    pub fn create_room_at(&self, now: Instant) -> String {
        loop {
            let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
            if self.insert_room(id.clone(), now) {
                return id;
            }
        }
    }

    /// Create a room with a fixed id if it does not exist yet. Returns true
    /// when created.
    pub fn open_room(&self, room_id: &str) -> bool {
        !room_id.is_empty() && self.insert_room(room_id.to_string(), Instant::now())
    }

    /// Insert an empty room unless the id is taken.
    fn insert_room(&self, id: String, now: Instant) -> bool {
        let mut dir = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match dir.rooms.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Room {
                    created_at: now,
                    members: HashSet::new(),
                });
                true
            }
        }
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .rooms
            .contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .rooms
            .len()
    }

    pub fn connected_count(&self, room_id: &str) -> Option<usize> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .rooms
            .get(room_id)
            .map(|r| r.members.len())
    }

    pub fn socket_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .sockets
            .len()
    }

    /// Join `room_id`, leaving any previous room. Replies `roomJoined` on
    /// success or a single `roomError` when the room does not exist.
    /// Returns the room's member count after joining.
    pub fn join_room(&self, socket: SocketId, room_id: &str) -> Result<usize, RelayError> {
        let mut dir = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !dir.sockets.contains_key(&socket) {
            return Err(RelayError::UnknownSocket);
        }

        if room_id.is_empty() || !dir.rooms.contains_key(room_id) {
            let err = RelayError::RoomNotFound(room_id.to_string());
            if let Some(s) = dir.sockets.get(&socket) {
                let _ = s.tx.try_send(Frame::room_error(err.to_string()));
            }
            return Err(err);
        }

        dir.leave(socket);
        let connected = match dir.rooms.get_mut(room_id) {
            Some(room) => {
                room.members.insert(socket);
                room.members.len()
            }
            None => 0,
        };
        if let Some(s) = dir.sockets.get_mut(&socket) {
            s.room = Some(room_id.to_string());
            let _ = s.tx.try_send(Frame::room_joined(room_id, &self.game_type));
        }
        Ok(connected)
    }

    /// Leave the current room. Repeated calls are no-ops.
    pub fn leave(&self, socket: SocketId) -> Option<(String, usize)> {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .leave(socket)
    }

    /// The room `socket` is currently in.
    pub fn room_of(&self, socket: SocketId) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .sockets
            .get(&socket)
            .and_then(|s| s.room.clone())
    }

    // ----- Relay -----

    /// Forward an allow-listed event to the sender's room. Returns how many
    /// sockets received it. Sockets whose channel is closed or full are
    /// skipped.
    pub fn relay(
        &self,
        socket: SocketId,
        event: &str,
        data: serde_json::Value,
    ) -> Result<usize, RelayError> {
        let kind =
            RelayEvent::from_name(event).ok_or_else(|| RelayError::UnknownEvent(event.into()))?;
        if kind.carries_shot() {
            validate_shot_payload(&data).map_err(RelayError::InvalidPayload)?;
        }

        let dir = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let sender = dir.sockets.get(&socket).ok_or(RelayError::UnknownSocket)?;
        let room_id = sender.room.as_deref().ok_or(RelayError::NotInRoom)?;
        let room = dir.rooms.get(room_id).ok_or(RelayError::NotInRoom)?;

        let frame = Frame::new(kind.name(), data);
        let include_sender = kind.echoes_to_sender();
        let mut delivered = 0;
        for member in &room.members {
            if *member == socket && !include_sender {
                continue;
            }
            let Some(s) = dir.sockets.get(member) else {
                continue;
            };
            match s.tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        "relay: socket {member} queue full, '{}' skipped",
                        kind.name()
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        Ok(delivered)
    }

    // ----- Directory -----

    pub fn list_rooms(&self) -> RoomListing {
        self.list_rooms_at(Instant::now())
    }

    /// Evict empty rooms older than the TTL, then list what is left.
    pub fn list_rooms_at(&self, now: Instant) -> RoomListing {
        let mut dir = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let ttl = self.room_ttl;
        let mut evicted: Vec<String> = dir
            .rooms
            .iter()
            .filter(|(_, r)| {
                r.members.is_empty() && now.saturating_duration_since(r.created_at) > ttl
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            dir.rooms.remove(id);
        }
        evicted.sort();

        let mut rooms: Vec<String> = dir.rooms.keys().cloned().collect();
        rooms.sort();
        RoomListing { rooms, evicted }
    }
}

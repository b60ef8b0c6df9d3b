//! Shared domain types carried on the bus and in REST responses.
//!
//! Pure data; the bus message envelope in `message.rs` references them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActorStatus: generic actor lifecycle
// ---------------------------------------------------------------------------

/// Generic actor lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorStatus {
    Starting,
    Disconnected,
    Connected,
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Actor state emitted on the bus. Carries lifecycle status and
/// actor-specific key/value telemetry (room, strokes, socket counts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorState {
    pub status: ActorStatus,
    #[serde(default)]
    pub telemetry: HashMap<String, String>,
}

impl ActorState {
    pub fn new(status: ActorStatus, telemetry: HashMap<String, String>) -> Self {
        Self { status, telemetry }
    }
}

// ---------------------------------------------------------------------------
// RoomActivity: relay directory changes
// ---------------------------------------------------------------------------

/// What happened to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomActivityKind {
    Created,
    Joined,
    Left,
    Evicted,
    Rejected,
}

impl fmt::Display for RoomActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Joined => write!(f, "joined"),
            Self::Left => write!(f, "left"),
            Self::Evicted => write!(f, "evicted"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A room directory change, as seen by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomActivity {
    pub room_id: String,
    pub kind: RoomActivityKind,
    /// Members after the change (0 for evictions and rejections).
    #[serde(default)]
    pub connected: usize,
}

//! Unified `PuttlinkMessage` bus types.
//!
//! All server-internal notifications flow through a single
//! `broadcast<PuttlinkMessage>` channel. Each message has a source (global ID
//! of the originator), timestamp, and a typed event. Relay traffic between
//! devices does not travel on the bus; it goes socket to socket.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorState, RoomActivity};

// ---------------------------------------------------------------------------
// Top-level message
// ---------------------------------------------------------------------------

/// A single event on the unified bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuttlinkMessage {
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub event: PuttlinkEvent,
}

impl PuttlinkMessage {
    /// Create a new message with the current UTC timestamp. Use `.source()`
    /// to stamp the originator when not sending through a `BusSender`.
    pub fn new(event: impl Into<PuttlinkEvent>) -> Self {
        Self {
            source: String::new(),
            timestamp: Utc::now(),
            event: event.into(),
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

// ---------------------------------------------------------------------------
// From impls: inner event types -> PuttlinkEvent
// ---------------------------------------------------------------------------

impl From<ActorState> for PuttlinkEvent {
    fn from(state: ActorState) -> Self {
        PuttlinkEvent::ActorStatus(state)
    }
}

impl From<RoomActivity> for PuttlinkEvent {
    fn from(activity: RoomActivity) -> Self {
        PuttlinkEvent::RoomActivity(activity)
    }
}

impl From<AlertMessage> for PuttlinkEvent {
    fn from(alert: AlertMessage) -> Self {
        PuttlinkEvent::Alert(alert)
    }
}

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// The typed event payload carried by a `PuttlinkMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PuttlinkEvent {
    /// Generic actor status update.
    ActorStatus(ActorState),
    /// Room created, joined, left, evicted, or a join rejected.
    RoomActivity(RoomActivity),
    /// Alert for user-visible warn/error conditions.
    Alert(AlertMessage),
}

// ---------------------------------------------------------------------------
// AlertMessage: user-visible warn/error notifications
// ---------------------------------------------------------------------------

/// Severity level for alert messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warn,
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warn => write!(f, "warn"),
            AlertLevel::Error => write!(f, "error"),
        }
    }
}

/// A user-visible alert. Info/debug/trace stays in the tracing backend;
/// warn/error conditions (dropped payloads, bind failures) surface here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub level: AlertLevel,
    pub message: String,
}

//! Room-scoped wire protocol between controller, server, and display.
//!
//! Every WebSocket text message is one `Frame`:
//!
//! ```json
//! { "event": "orientation", "data": { "x": 0.1, "y": 0.0, "z": 0.99 } }
//! ```
//!
//! The relay treats `data` as opaque JSON (it holds no game logic) except for
//! shot payloads, which are validated before forwarding. Sessions decode
//! frames into the typed `GameEvent`.

use std::fmt;

use glam::DVec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JOIN_ROOM: &str = "joinRoom";
pub const ROOM_JOINED: &str = "roomJoined";
pub const ROOM_ERROR: &str = "roomError";

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One named event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn join_room(room_id: &str) -> Self {
        Self::new(JOIN_ROOM, Value::String(room_id.to_string()))
    }

    pub fn room_joined(room_id: &str, game_type: &str) -> Self {
        Self::new(
            ROOM_JOINED,
            serde_json::json!({ "roomId": room_id, "gameType": game_type }),
        )
    }

    pub fn room_error(message: impl Into<String>) -> Self {
        Self::new(ROOM_ERROR, serde_json::json!({ "message": message.into() }))
    }

    /// The room id carried by a `joinRoom` frame. Accepts a bare string or
    /// `{ "roomId": ... }`.
    pub fn join_target(&self) -> Option<&str> {
        if self.event != JOIN_ROOM {
            return None;
        }
        match &self.data {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => map.get("roomId").and_then(Value::as_str),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayEvent allow-list
// ---------------------------------------------------------------------------

/// Event names the relay forwards between room members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayEvent {
    Orientation,
    Throw,
    AimStart,
    SwingData,
    HoleComplete,
    GameComplete,
}

impl RelayEvent {
    pub const ALL: &[RelayEvent] = &[
        RelayEvent::Orientation,
        RelayEvent::Throw,
        RelayEvent::AimStart,
        RelayEvent::SwingData,
        RelayEvent::HoleComplete,
        RelayEvent::GameComplete,
    ];

    /// Parse a wire name. Returns `None` for anything off the allow-list.
    pub fn from_name(name: &str) -> Option<RelayEvent> {
        match name {
            "orientation" => Some(RelayEvent::Orientation),
            "throw" => Some(RelayEvent::Throw),
            "aim_start" => Some(RelayEvent::AimStart),
            "swing_data" => Some(RelayEvent::SwingData),
            "holeComplete" => Some(RelayEvent::HoleComplete),
            "gameComplete" => Some(RelayEvent::GameComplete),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RelayEvent::Orientation => "orientation",
            RelayEvent::Throw => "throw",
            RelayEvent::AimStart => "aim_start",
            RelayEvent::SwingData => "swing_data",
            RelayEvent::HoleComplete => "holeComplete",
            RelayEvent::GameComplete => "gameComplete",
        }
    }

    /// `throw` is broadcast to the whole room including the sender; every
    /// other event excludes the sender. Controllers rely on the echo as
    /// shot feedback.
    pub fn echoes_to_sender(self) -> bool {
        matches!(self, RelayEvent::Throw)
    }

    /// Events whose payload must pass `validate_shot_payload` before relay.
    pub fn carries_shot(self) -> bool {
        matches!(self, RelayEvent::Throw)
    }
}

impl fmt::Display for RelayEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// `orientation` payload: a unit-ish aim direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationPayload {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// `swing_data` payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPayload {
    /// Degrees, positive = clockwise.
    pub deviation: f64,
    pub power: f64,
}

/// `throw` payload: raw shot vector plus the analyzed power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThrowPayload {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub power: f64,
}

/// `holeComplete` / `gameComplete` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    /// 1-based hole number (the last hole for `gameComplete`).
    pub hole: usize,
    pub strokes: u32,
    pub par: u32,
    pub total_strokes: u32,
    pub total_par: u32,
}

impl ScorePayload {
    /// Strokes relative to par for the whole round so far.
    pub fn relative_to_par(&self) -> i64 {
        self.total_strokes as i64 - self.total_par as i64
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Why a payload could not be used.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadError {
    /// Payload is not a JSON object.
    NotAnObject,
    /// Named field missing, not a number, or not finite.
    BadNumber(&'static str),
    /// Payload failed to decode into the typed shape.
    Malformed(String),
    /// Event name is not a game event.
    UnknownEvent(String),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "payload is not an object"),
            Self::BadNumber(field) => write!(f, "field '{field}' is not a finite number"),
            Self::Malformed(e) => write!(f, "malformed payload: {e}"),
            Self::UnknownEvent(name) => write!(f, "unknown event '{name}'"),
        }
    }
}

impl std::error::Error for PayloadError {}

fn finite_field(map: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64, PayloadError> {
    map.get(field)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or(PayloadError::BadNumber(field))
}

/// Check that a shot payload is an object with numeric, finite `x`, `y`, `z`.
///
/// JSON has no NaN; a NaN produced by a client serializes as `null`, which
/// fails here like any other non-number.
pub fn validate_shot_payload(data: &Value) -> Result<DVec3, PayloadError> {
    let map = data.as_object().ok_or(PayloadError::NotAnObject)?;
    Ok(DVec3::new(
        finite_field(map, "x")?,
        finite_field(map, "y")?,
        finite_field(map, "z")?,
    ))
}

fn decode<T: DeserializeOwned>(data: &Value) -> Result<T, PayloadError> {
    serde_json::from_value(data.clone()).map_err(|e| PayloadError::Malformed(e.to_string()))
}

fn check_finite(values: &[(&'static str, f64)]) -> Result<(), PayloadError> {
    for (field, v) in values {
        if !v.is_finite() {
            return Err(PayloadError::BadNumber(field));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GameEvent
// ---------------------------------------------------------------------------

/// A relayed game event, decoded and numerically validated.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Orientation(OrientationPayload),
    AimStart,
    SwingData(SwingPayload),
    Throw(ThrowPayload),
    HoleComplete(ScorePayload),
    GameComplete(ScorePayload),
}

impl GameEvent {
    pub fn kind(&self) -> RelayEvent {
        match self {
            GameEvent::Orientation(_) => RelayEvent::Orientation,
            GameEvent::AimStart => RelayEvent::AimStart,
            GameEvent::SwingData(_) => RelayEvent::SwingData,
            GameEvent::Throw(_) => RelayEvent::Throw,
            GameEvent::HoleComplete(_) => RelayEvent::HoleComplete,
            GameEvent::GameComplete(_) => RelayEvent::GameComplete,
        }
    }

    /// Decode a frame. Numbers used by physics are checked for finiteness.
    pub fn decode(frame: &Frame) -> Result<GameEvent, PayloadError> {
        let kind = RelayEvent::from_name(&frame.event)
            .ok_or_else(|| PayloadError::UnknownEvent(frame.event.clone()))?;
        match kind {
            RelayEvent::Orientation => {
                let map = frame.data.as_object().ok_or(PayloadError::NotAnObject)?;
                Ok(GameEvent::Orientation(OrientationPayload {
                    x: finite_field(map, "x")?,
                    y: finite_field(map, "y")?,
                    z: finite_field(map, "z")?,
                }))
            }
            RelayEvent::AimStart => Ok(GameEvent::AimStart),
            RelayEvent::SwingData => {
                let p: SwingPayload = decode(&frame.data)?;
                check_finite(&[("deviation", p.deviation), ("power", p.power)])?;
                Ok(GameEvent::SwingData(p))
            }
            RelayEvent::Throw => {
                let v = validate_shot_payload(&frame.data)?;
                let power = frame
                    .data
                    .get("power")
                    .and_then(Value::as_f64)
                    .filter(|p| p.is_finite())
                    .unwrap_or(0.0);
                Ok(GameEvent::Throw(ThrowPayload {
                    x: v.x,
                    y: v.y,
                    z: v.z,
                    power,
                }))
            }
            RelayEvent::HoleComplete => Ok(GameEvent::HoleComplete(decode(&frame.data)?)),
            RelayEvent::GameComplete => Ok(GameEvent::GameComplete(decode(&frame.data)?)),
        }
    }

    pub fn encode(&self) -> Frame {
        let data = match self {
            GameEvent::Orientation(p) => serde_json::to_value(p),
            GameEvent::AimStart => Ok(Value::Null),
            GameEvent::SwingData(p) => serde_json::to_value(p),
            GameEvent::Throw(p) => serde_json::to_value(p),
            GameEvent::HoleComplete(p) | GameEvent::GameComplete(p) => serde_json::to_value(p),
        };
        Frame::new(self.kind().name(), data.unwrap_or(Value::Null))
    }
}

//! REST API request/response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ActorStatus;

/// GET /rooms response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<String>,
}

/// GET /game and GET /controller response: the resolved session a device
/// page should bind to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub room_id: String,
    pub role: DeviceRole,
    pub game_type: String,
}

/// Which side of a room a device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Display,
    Controller,
}

/// GET /api/status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub actors: HashMap<String, ActorStatusResponse>,
    #[serde(default)]
    pub rooms: usize,
}

/// Per-actor status within the status response. Also used as the cached
/// per-actor state in the web layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorStatusResponse {
    #[serde(default)]
    pub name: String,
    pub status: ActorStatus,
    #[serde(default)]
    pub telemetry: HashMap<String, String>,
}

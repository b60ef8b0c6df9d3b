//! REST endpoint handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;

use super::WebState;
use crate::state::relay::SessionRelay;
use puttlink::{
    DeviceRole, PuttlinkMessage, RoomActivityKind, RoomsResponse, SessionDescriptor,
    StatusResponse,
};

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>puttlink</title></head>
<body>
<h1>puttlink</h1>
<p><a href="/create-room">Create a room</a> and open it on the big screen.</p>
<p>Then join from a phone at <code>/controller?room=&lt;id&gt;</code>.</p>
</body>
</html>
"#;

/// GET /
pub async fn get_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// GET /create-room: new room, then see-other to the display page.
pub async fn get_create_room(State(state): State<Arc<WebState>>) -> Redirect {
    let room_id = state.root.relay.create_room();
    let display_path = state.root.system.snapshot().relay.display_path;
    tracing::info!("room {room_id} created");
    state.room_activity(&room_id, RoomActivityKind::Created, 0);
    Redirect::to(&format!("{display_path}?room={room_id}"))
}

/// GET /rooms: live room ids. Stale empty rooms are evicted first.
pub async fn get_rooms(State(state): State<Arc<WebState>>) -> Json<RoomsResponse> {
    let listing = state.root.relay.list_rooms();
    for room_id in &listing.evicted {
        tracing::info!("room {room_id} evicted");
        state.room_activity(room_id, RoomActivityKind::Evicted, 0);
    }
    Json(RoomsResponse {
        rooms: listing.rooms,
    })
}

#[derive(Deserialize)]
pub struct RoomQuery {
    pub room: Option<String>,
}

/// The descriptor a device page binds to, or `None` if the room is unknown.
pub fn resolve_session(
    relay: &SessionRelay,
    room: Option<&str>,
    role: DeviceRole,
) -> Option<SessionDescriptor> {
    let room_id = room.filter(|r| !r.is_empty())?;
    relay.room_exists(room_id).then(|| SessionDescriptor {
        room_id: room_id.to_string(),
        role,
        game_type: relay.game_type().to_string(),
    })
}

fn session_or_home(state: &WebState, query: RoomQuery, role: DeviceRole) -> Response {
    match resolve_session(&state.root.relay, query.room.as_deref(), role) {
        Some(descriptor) => Json(descriptor).into_response(),
        None => Redirect::to("/").into_response(),
    }
}

/// GET /game?room=<id>
pub async fn get_display(
    State(state): State<Arc<WebState>>,
    Query(query): Query<RoomQuery>,
) -> Response {
    session_or_home(&state, query, DeviceRole::Display)
}

/// GET /controller?room=<id>
pub async fn get_controller(
    State(state): State<Arc<WebState>>,
    Query(query): Query<RoomQuery>,
) -> Response {
    session_or_home(&state, query, DeviceRole::Controller)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ActivityQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// GET /api/status
pub async fn get_status(State(state): State<Arc<WebState>>) -> Json<StatusResponse> {
    let actors = state.actors.read().await.clone();
    Json(StatusResponse {
        actors,
        rooms: state.root.relay.room_count(),
    })
}

/// GET /api/activity?limit=50: most recent room and alert events, oldest first.
pub async fn get_activity(
    State(state): State<Arc<WebState>>,
    Query(query): Query<ActivityQuery>,
) -> Json<Vec<PuttlinkMessage>> {
    let activity = state.activity.read().await;
    let start = activity.len().saturating_sub(query.limit);
    Json(activity.iter().skip(start).cloned().collect())
}

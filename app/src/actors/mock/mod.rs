//! Simulated devices for running a room without phones or browsers.

pub mod controller;
pub mod display;
pub mod green;

use tracing::debug;

use crate::bus::BusSender;
use crate::state::relay::{FrameRx, SessionRelay, SocketId};
use puttlink::{AlertLevel, GameEvent, PuttlinkMessage, RoomActivity, RoomActivityKind};

/// Join `room` on the in-process relay, creating it if needed.
pub(crate) fn join(
    relay: &SessionRelay,
    room: &str,
    sender: &BusSender,
) -> Option<(SocketId, FrameRx)> {
    if relay.open_room(room) {
        sender.send(PuttlinkMessage::new(RoomActivity {
            room_id: room.to_string(),
            kind: RoomActivityKind::Created,
            connected: 0,
        }));
    }
    let (socket, frames) = relay.connect();
    match relay.join_room(socket, room) {
        Ok(connected) => {
            sender.send(PuttlinkMessage::new(RoomActivity {
                room_id: room.to_string(),
                kind: RoomActivityKind::Joined,
                connected,
            }));
            Some((socket, frames))
        }
        Err(e) => {
            sender.alert(AlertLevel::Error, format!("could not join room {room}: {e}"));
            relay.disconnect(socket);
            None
        }
    }
}

/// Send an event into the room from `socket`.
pub(crate) fn publish(relay: &SessionRelay, socket: SocketId, event: &GameEvent) {
    let frame = event.encode();
    match relay.relay(socket, &frame.event, frame.data) {
        Ok(n) => debug!("mock: '{}' -> {n}", frame.event),
        Err(e) => debug!("mock: '{}' not relayed: {e}", frame.event),
    }
}

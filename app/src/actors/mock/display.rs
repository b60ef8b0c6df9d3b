//! Headless display: plays the configured course on a flat green.
//!
//! Joins its room through the relay like any browser would, applies relayed
//! shots to the green, and relays `holeComplete` / `gameComplete` back.
//! After the last hole it waits a moment and starts a new round.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::green::FlatGreen;
use super::{join, publish};
use crate::actors::Actor;
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::SystemState;
use puttlink::{
    ActorStatus, AlertLevel, DisplaySession, GameEvent, GameTuning, HoleEvent, ROOM_ERROR,
    ROOM_JOINED, StaticCourse,
};

const TICK: Duration = Duration::from_millis(16);
const NEW_ROUND_DELAY: Duration = Duration::from_secs(10);

pub struct MockDisplayActor {
    pub room: String,
}

impl Actor for MockDisplayActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let room = self.room.clone();
        let thread_name = format!("display:{}", sender.actor_id());

        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(state, room, sender, receiver))
            .expect("failed to spawn mock display thread");
    }
}

struct Table {
    shots: u32,
    rejected: u32,
    rounds: u32,
}

fn telemetry(
    room: &str,
    session: &DisplaySession<StaticCourse>,
    green: &FlatGreen,
    t: &Table,
) -> HashMap<String, String> {
    let hole = session.hole_state();
    let ball = if green.is_resting() { "resting" } else { "rolling" };
    HashMap::from([
        ("device_info".into(), "Mock Display (flat green)".into()),
        ("room".into(), room.to_string()),
        ("hole".into(), (hole.current_course_index + 1).to_string()),
        ("par".into(), hole.par.to_string()),
        ("strokes".into(), hole.stroke_count.to_string()),
        ("ball".into(), ball.into()),
        ("total_strokes".into(), session.machine().total_strokes().to_string()),
        ("shots".into(), t.shots.to_string()),
        ("rejected".into(), t.rejected.to_string()),
        ("rounds".into(), t.rounds.to_string()),
    ])
}

fn new_session(
    room: &str,
    tuning: &GameTuning,
    course: StaticCourse,
    green: &mut FlatGreen,
) -> Option<DisplaySession<StaticCourse>> {
    let mut session = DisplaySession::new(room, tuning, course).ok()?;
    green.cup.clear_observers();
    session.begin(&mut green.ball, &mut green.cup)?;
    Some(session)
}

fn run(state: Arc<SystemState>, room: String, sender: BusSender, mut receiver: BusReceiver) {
    let relay = &state.relay;
    let Some((socket, mut frames)) = join(relay, &room, &sender) else {
        sender.status(ActorStatus::Disconnected, HashMap::new());
        return;
    };

    let config = state.system.snapshot();
    let tuning = config.tuning;
    let sensor_radius = tuning.hole.cup_radius * tuning.hole.contact_radius_factor;
    let mut green = FlatGreen::new();
    let Some(mut session) = new_session(
        &room,
        &tuning,
        StaticCourse::from_section(&config.course),
        &mut green,
    ) else {
        sender.alert(AlertLevel::Error, "mock display: course has no holes");
        relay.disconnect(socket);
        sender.status(ActorStatus::Disconnected, HashMap::new());
        return;
    };
    if let Some(layout) = session.machine().layout() {
        green.cup.place(layout.cup, sensor_radius);
    }
    session.snap_to_cup(&green.ball);

    let mut table = Table {
        shots: 0,
        rejected: 0,
        rounds: 1,
    };
    sender.status(ActorStatus::Connected, telemetry(&room, &session, &green, &table));
    info!("mock display: playing in room {room}");

    let start = Instant::now();
    let mut restart_at: Option<Instant> = None;

    loop {
        loop {
            match receiver.poll() {
                Err(PollError::Shutdown) => {
                    relay.disconnect(socket);
                    sender.status(ActorStatus::Disconnected, HashMap::new());
                    return;
                }
                Ok(None) => break,
                Ok(Some(_)) => {}
            }
        }

        let now_ms = start.elapsed().as_secs_f64() * 1000.0;
        let mut changed = false;

        while let Ok(frame) = frames.try_recv() {
            if frame.event == ROOM_JOINED || frame.event == ROOM_ERROR {
                continue;
            }
            let event = match GameEvent::decode(&frame) {
                Ok(ev) => ev,
                Err(e) => {
                    debug!("mock display: ignoring '{}': {e}", frame.event);
                    continue;
                }
            };
            let is_shot = matches!(event, GameEvent::SwingData(_) | GameEvent::Throw(_));
            match session.handle(event, now_ms, &mut green.ball) {
                Ok(Some(outcome)) => {
                    table.shots += 1;
                    changed = true;
                    info!(
                        "mock display: stroke {} force={:.2}",
                        outcome.strokes, outcome.applied.force
                    );
                }
                Ok(None) => {}
                Err(rejected) if is_shot => {
                    table.rejected += 1;
                    changed = true;
                    info!("mock display: shot rejected: {rejected}");
                }
                Err(e) => debug!("mock display: {e}"),
            }
        }

        green.step(TICK.as_secs_f64());

        for event in session.tick(now_ms, Some(&mut green.ball)) {
            changed = true;
            match &event {
                HoleEvent::HoleStarted { hole_index, par } => {
                    info!("mock display: hole {} (par {par})", hole_index + 1);
                    if let Some(layout) = session.machine().layout() {
                        green.cup.place(layout.cup, sensor_radius);
                    }
                    session.snap_to_cup(&green.ball);
                }
                HoleEvent::Ready => session.snap_to_cup(&green.ball),
                HoleEvent::OutOfBounds { penalty, strokes } => {
                    info!("mock display: out of bounds (penalty={penalty}, strokes={strokes})");
                    session.snap_to_cup(&green.ball);
                }
                HoleEvent::Holed { score, detection } => {
                    info!(
                        "mock display: holed hole {} in {} ({detection:?})",
                        score.hole_index + 1,
                        score.strokes
                    );
                }
                HoleEvent::GameComplete {
                    total_strokes,
                    total_par,
                    ..
                } => {
                    info!("mock display: round complete, {total_strokes} strokes (par {total_par})");
                    restart_at = Some(Instant::now() + NEW_ROUND_DELAY);
                }
            }
            if let Some(score) = session.score_event(&event) {
                publish(relay, socket, &score);
            }
        }

        if let Some(at) = restart_at
            && Instant::now() >= at
        {
            restart_at = None;
            let course = StaticCourse::from_section(&state.system.snapshot().course);
            if let Some(next) = new_session(&room, &tuning, course, &mut green) {
                session = next;
                table.rounds += 1;
                changed = true;
                if let Some(layout) = session.machine().layout() {
                    green.cup.place(layout.cup, sensor_radius);
                }
                session.snap_to_cup(&green.ball);
            }
        }

        if changed {
            sender.status(ActorStatus::Connected, telemetry(&room, &session, &green, &table));
        }

        std::thread::sleep(TICK);
    }
}

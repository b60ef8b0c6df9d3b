//! Simulated phone controller.
//!
//! Aims for a couple of seconds (holding a steady heading with a little hand
//! jitter), then swings with a synthetic sensor trace and relays the result.
//! Swing strength and pull vary deterministically from swing to swing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::{join, publish};
use crate::actors::Actor;
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::SystemState;
use puttlink::{
    ActorStatus, ControllerMode, ControllerSession, GameEvent, ROOM_ERROR, ROOM_JOINED,
    SensorReading,
};

const TICK: Duration = Duration::from_millis(16);
const AIM_DURATION: Duration = Duration::from_secs(2);
const SWING_SAMPLES: usize = 12;
const SWING_SAMPLE_MS: f64 = 10.0;

pub struct MockControllerActor {
    pub room: String,
    pub swing_interval_secs: f64,
    pub mode: ControllerMode,
}

impl Actor for MockControllerActor {
    fn start(&self, state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let room = self.room.clone();
        let interval = Duration::from_secs_f64(self.swing_interval_secs.max(1.0));
        let mode = self.mode;
        let thread_name = format!("controller:{}", sender.actor_id());

        std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(state, room, interval, mode, sender, receiver))
            .expect("failed to spawn mock controller thread");
    }
}

/// Swing `n`'s intended power and pull (degrees).
fn swing_plan(n: u32) -> (f64, f64) {
    let v = (n as f64 * 0.7).sin();
    let pull = (n as f64 * 1.3).sin();
    (0.5 + 0.08 * v, pull)
}

/// Heading the phone is held at while aiming for swing `n`.
fn aim_heading(n: u32) -> f64 {
    40.0 * (n as f64 * 0.9).sin()
}

fn reading(heading: f64, beta: f64, timestamp_ms: f64) -> SensorReading {
    SensorReading {
        alpha: Some(heading),
        beta,
        gamma: 0.0,
        timestamp_ms,
        ..Default::default()
    }
}

/// Sensor events for one swing: constant tilt rate giving `power` at
/// `solid_hit_speed`, with the heading drifting by `pull` degrees.
fn swing_trace(
    heading: f64,
    power: f64,
    pull: f64,
    start_ms: f64,
    solid_hit_speed: f64,
) -> Vec<SensorReading> {
    let tilt_per_sample = power * solid_hit_speed * SWING_SAMPLE_MS / 1000.0;
    (0..SWING_SAMPLES)
        .map(|i| {
            let f = i as f64 / (SWING_SAMPLES - 1) as f64;
            reading(
                heading + pull * f,
                -20.0 + tilt_per_sample * i as f64,
                start_ms + SWING_SAMPLE_MS * i as f64,
            )
        })
        .collect()
}

#[derive(Default)]
struct Table {
    swings: u32,
    taps: u32,
    holes: u32,
    last_power: f64,
    last_deviation: f64,
    last_score: String,
}

fn telemetry(room: &str, mode: ControllerMode, t: &Table) -> HashMap<String, String> {
    HashMap::from([
        ("device_info".into(), "Mock Controller (simulated)".into()),
        ("room".into(), room.to_string()),
        ("mode".into(), mode.to_string()),
        ("swings".into(), t.swings.to_string()),
        ("taps".into(), t.taps.to_string()),
        ("holes".into(), t.holes.to_string()),
        ("last_power".into(), format!("{:.2}", t.last_power)),
        ("last_deviation".into(), format!("{:.1}", t.last_deviation)),
        ("last_score".into(), t.last_score.clone()),
    ])
}

#[derive(Clone, Copy)]
enum Phase {
    Waiting { until: Instant },
    Aiming { since: Instant, heading: f64 },
}

fn run(
    state: Arc<SystemState>,
    room: String,
    interval: Duration,
    mode: ControllerMode,
    sender: BusSender,
    mut receiver: BusReceiver,
) {
    let relay = &state.relay;
    let Some((socket, mut frames)) = join(relay, &room, &sender) else {
        sender.status(ActorStatus::Disconnected, HashMap::new());
        return;
    };

    let tuning = state.system.snapshot().tuning;
    let mut session = match ControllerSession::new(room.as_str(), &tuning, mode) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("mock controller: {e}");
            relay.disconnect(socket);
            sender.status(ActorStatus::Disconnected, HashMap::new());
            return;
        }
    };

    let mut table = Table::default();
    sender.status(ActorStatus::Connected, telemetry(&room, mode, &table));
    info!("mock controller: joined room {room}, swinging every {interval:?}");

    let start = Instant::now();
    // first swing shortly after startup
    let mut phase = Phase::Waiting {
        until: start + Duration::from_secs(1),
    };

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

        let mut changed = false;
        while let Ok(frame) = frames.try_recv() {
            if frame.event == ROOM_JOINED || frame.event == ROOM_ERROR {
                continue;
            }
            match GameEvent::decode(&frame) {
                Ok(GameEvent::HoleComplete(score)) => {
                    table.holes += 1;
                    table.last_score = format!(
                        "hole {}: {} (par {})",
                        score.hole, score.strokes, score.par
                    );
                    changed = true;
                    info!("mock controller: {}", table.last_score);
                }
                Ok(GameEvent::GameComplete(score)) => {
                    table.last_score = format!(
                        "round: {} ({:+})",
                        score.total_strokes,
                        score.relative_to_par()
                    );
                    changed = true;
                    info!("mock controller: {}", table.last_score);
                }
                Ok(GameEvent::Throw(_)) => debug!("mock controller: throw echoed"),
                Ok(_) => {}
                Err(e) => debug!("mock controller: ignoring '{}': {e}", frame.event),
            }
        }

        let now = Instant::now();
        let now_ms = now.duration_since(start).as_secs_f64() * 1000.0;
        match phase {
            Phase::Waiting { until } if now >= until => {
                let event = session.start_aiming();
                publish(relay, socket, &event);
                phase = Phase::Aiming {
                    since: now,
                    heading: aim_heading(table.swings + table.taps),
                };
            }
            Phase::Waiting { .. } => {}
            Phase::Aiming { since, heading } => {
                let jitter = 0.5 * (now_ms / 1000.0 * 3.0).sin();
                if let Some(event) = session.on_sensor(&reading(heading + jitter, -20.0, now_ms)) {
                    publish(relay, socket, &event);
                }

                if now.duration_since(since) >= AIM_DURATION {
                    session.stop_aiming();
                    let n = table.swings + table.taps;
                    let (power, pull) = swing_plan(n);
                    session.start_putt();
                    for r in swing_trace(
                        heading + jitter,
                        power,
                        pull,
                        now_ms,
                        tuning.swing.solid_hit_speed,
                    ) {
                        session.on_sensor(&r);
                    }
                    match session.release_putt() {
                        Ok(events) => {
                            for event in &events {
                                publish(relay, socket, event);
                            }
                            if let Some(report) = session.last_report() {
                                table.last_power = report.shot.power;
                                table.last_deviation = report.deviation_degrees;
                                info!(
                                    "mock controller: swing #{} power={:.2} deviation={:+.1}",
                                    table.swings + 1,
                                    report.shot.power,
                                    report.deviation_degrees
                                );
                            }
                            table.swings += 1;
                        }
                        Err(e) => {
                            table.taps += 1;
                            debug!("mock controller: {e}");
                        }
                    }
                    changed = true;
                    phase = Phase::Waiting {
                        until: now + interval,
                    };
                }
            }
        }

        if changed {
            sender.status(ActorStatus::Connected, telemetry(&room, mode, &table));
        }

        std::thread::sleep(TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puttlink::GameTuning;

    #[test]
    fn plan_stays_in_putting_range() {
        for n in 0..50 {
            let (power, pull) = swing_plan(n);
            assert!((0.42..=0.58).contains(&power));
            assert!(pull.abs() <= 1.0);
            assert!(aim_heading(n).abs() <= 40.0);
        }
    }

    #[test]
    fn trace_produces_planned_swing() {
        let tuning = GameTuning::default();
        let mut session = ControllerSession::new("lobby001", &tuning, ControllerMode::Swing)
            .unwrap();
        session.start_aiming();
        session.on_sensor(&reading(25.0, -20.0, 0.0));
        assert_eq!(session.stop_aiming(), 25.0);

        session.start_putt();
        for r in swing_trace(25.0, 0.5, 0.8, 100.0, tuning.swing.solid_hit_speed) {
            session.on_sensor(&r);
        }
        let events = session.release_putt().unwrap();
        match &events[..] {
            [GameEvent::SwingData(p)] => {
                assert!((p.power - 0.5).abs() < 1e-6);
                assert!((p.deviation - 0.8).abs() < 1e-6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

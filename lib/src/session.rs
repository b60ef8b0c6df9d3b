//! Per-device session contexts.
//!
//! Each device owns exactly one session: the controller turns sensor events
//! into outgoing game events, the display turns incoming game events into
//! physics impulses and runs the hole state machine. Sessions do no I/O.

use std::fmt;

use glam::DVec3;

use crate::aim::{AimController, AimPhase, EmitThrottle, direction_from_heading, heading_of};
use crate::course::CourseFactory;
use crate::hole::{HoleEvent, HoleState, HoleStateMachine};
use crate::physics::{ContactSource, PhysicsBody};
use crate::protocol::{GameEvent, OrientationPayload, ScorePayload, SwingPayload, ThrowPayload};
use crate::sample::{OrientationSampler, SensorReading};
use crate::shot::{AppliedImpulse, ShotApplier, ShotInput, ShotRejected};
use crate::swing::{ShotDescriptor, SwingAnalyzer, SwingError, SwingReport};
use crate::{ControllerMode, GameTuning};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session cannot run outside a room.
    MissingRoom,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoom => write!(f, "no room id given"),
        }
    }
}

impl std::error::Error for SessionError {}

fn require_room(room_id: String) -> Result<String, SessionError> {
    if room_id.trim().is_empty() {
        Err(SessionError::MissingRoom)
    } else {
        Ok(room_id)
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Phone-side session: aim streaming and swing capture.
#[derive(Debug)]
pub struct ControllerSession {
    room_id: String,
    mode: ControllerMode,
    aim: AimController,
    throttle: EmitThrottle,
    sampler: OrientationSampler,
    analyzer: SwingAnalyzer,
    throw_scale: f64,
    last_report: Option<SwingReport>,
}

impl ControllerSession {
    pub fn new(
        room_id: impl Into<String>,
        tuning: &GameTuning,
        mode: ControllerMode,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            room_id: require_room(room_id.into())?,
            mode,
            aim: AimController::new(),
            throttle: EmitThrottle::new(tuning.aim.emit_interval_ms),
            sampler: OrientationSampler::new(tuning.swing.max_history),
            analyzer: SwingAnalyzer::new(tuning.swing.clone()),
            throw_scale: tuning.shot.throw_scale,
            last_report: None,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn mode(&self) -> ControllerMode {
        self.mode
    }

    pub fn aim(&self) -> &AimController {
        &self.aim
    }

    pub fn is_putting(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn last_report(&self) -> Option<&SwingReport> {
        self.last_report.as_ref()
    }

    pub fn start_aiming(&mut self) -> GameEvent {
        self.aim.start_aiming();
        self.throttle.reset();
        GameEvent::AimStart
    }

    /// Lock the aim and return the locked heading.
    pub fn stop_aiming(&mut self) -> f64 {
        self.aim.stop_aiming()
    }

    /// Feed one orientation event. Returns a throttled `orientation` event
    /// while aiming; also buffers the reading if a putt is in progress.
    pub fn on_sensor(&mut self, reading: &SensorReading) -> Option<GameEvent> {
        self.aim.observe_heading(reading.heading());
        self.sampler.record(reading);

        if self.aim.phase() != AimPhase::Aiming {
            return None;
        }
        if !self.throttle.ready(reading.timestamp_ms) {
            return None;
        }
        let d = self.aim.current_direction();
        Some(GameEvent::Orientation(OrientationPayload {
            x: d.x,
            y: d.y,
            z: d.z,
        }))
    }

    /// Open the swing window. An unfinished swing is discarded.
    pub fn start_putt(&mut self) {
        self.sampler.begin();
    }

    /// Close the swing window and produce the shot event for this mode.
    /// A short history is a tap, not a swing, and yields `TooShort`.
    pub fn release_putt(&mut self) -> Result<Vec<GameEvent>, SwingError> {
        let history = self.sampler.end();
        let report = self.analyzer.analyze(&history, self.aim.locked_angle())?;
        self.last_report = Some(report);

        let event = match self.mode {
            ControllerMode::Swing => GameEvent::SwingData(SwingPayload {
                deviation: report.deviation_degrees,
                power: report.shot.power,
            }),
            ControllerMode::Throw => {
                let v = direction_from_heading(report.shot.final_angle_degrees)
                    * report.shot.power
                    * self.throw_scale;
                GameEvent::Throw(ThrowPayload {
                    x: v.x,
                    y: v.y,
                    z: v.z,
                    power: report.shot.power,
                })
            }
        };
        Ok(vec![event])
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// A shot that made it onto the ball.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotOutcome {
    pub applied: AppliedImpulse,
    /// Stroke count after this shot.
    pub strokes: u32,
}

/// Course-side session: aim display, shot application, hole progression.
pub struct DisplaySession<C: CourseFactory> {
    room_id: String,
    course: C,
    aim: AimController,
    applier: ShotApplier,
    machine: HoleStateMachine,
}

impl<C: CourseFactory> DisplaySession<C> {
    pub fn new(
        room_id: impl Into<String>,
        tuning: &GameTuning,
        course: C,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            room_id: require_room(room_id.into())?,
            course,
            aim: AimController::new(),
            applier: ShotApplier::new(tuning.shot.clone()),
            machine: HoleStateMachine::new(tuning.hole.clone()),
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn aim(&self) -> &AimController {
        &self.aim
    }

    pub fn hole_state(&self) -> &HoleState {
        self.machine.state()
    }

    pub fn machine(&self) -> &HoleStateMachine {
        &self.machine
    }

    /// Wire the engine's contact callbacks and tee up hole 0.
    pub fn begin(
        &mut self,
        ball: &mut dyn PhysicsBody,
        contacts: &mut dyn ContactSource,
    ) -> Option<HoleEvent> {
        contacts.register_contact_observer(self.machine.contact_observer());
        self.machine.begin(&mut self.course, ball)
    }

    /// Apply one relayed event. Only shots return an outcome.
    pub fn handle(
        &mut self,
        event: GameEvent,
        now_ms: f64,
        ball: &mut dyn PhysicsBody,
    ) -> Result<Option<ShotOutcome>, ShotRejected> {
        match event {
            GameEvent::Orientation(p) => {
                let v = DVec3::new(p.x, p.y, p.z);
                if !v.is_finite() {
                    return Err(ShotRejected::InvalidInput);
                }
                // the controller only streams while aiming; catch up if
                // its aim_start was lost
                if self.aim.phase() != AimPhase::Aiming {
                    self.aim.start_aiming();
                }
                self.aim.apply_heading_vector(v);
                Ok(None)
            }
            GameEvent::AimStart => {
                self.aim.start_aiming();
                Ok(None)
            }
            GameEvent::SwingData(p) => {
                if !p.deviation.is_finite() || !p.power.is_finite() {
                    return Err(ShotRejected::InvalidInput);
                }
                let locked = self.aim.stop_aiming();
                let shot = ShotDescriptor {
                    final_angle_degrees: locked + p.deviation,
                    power: p.power,
                };
                self.shoot(ShotInput::Descriptor(shot), None, now_ms, ball)
                    .map(Some)
            }
            GameEvent::Throw(p) => {
                let aim = self
                    .aim
                    .has_heading()
                    .then(|| self.aim.current_direction());
                self.shoot(ShotInput::Vector(DVec3::new(p.x, p.y, p.z)), aim, now_ms, ball)
                    .map(Some)
            }
            // score events originate here; an echo from elsewhere is ignored
            GameEvent::HoleComplete(_) | GameEvent::GameComplete(_) => Ok(None),
        }
    }

    fn shoot(
        &mut self,
        input: ShotInput,
        aim: Option<DVec3>,
        now_ms: f64,
        ball: &mut dyn PhysicsBody,
    ) -> Result<ShotOutcome, ShotRejected> {
        let applied = self.applier.apply(input, self.machine.gate(), aim, ball)?;
        self.machine.record_stroke(now_ms);
        Ok(ShotOutcome {
            applied,
            strokes: self.machine.state().stroke_count,
        })
    }

    /// Make the next orientation sample read as "straight at the cup".
    pub fn snap_to_cup(&mut self, ball: &dyn PhysicsBody) {
        if let Some(layout) = self.machine.layout() {
            self.aim
                .request_snap_to_target(heading_of(layout.cup - ball.position()));
        }
    }

    pub fn tick(&mut self, now_ms: f64, ball: Option<&mut dyn PhysicsBody>) -> Vec<HoleEvent> {
        self.machine.tick(now_ms, ball, &mut self.course)
    }

    /// The outgoing score event for a hole event, if it has one.
    pub fn score_event(&self, event: &HoleEvent) -> Option<GameEvent> {
        match event {
            HoleEvent::Holed { score, .. } => Some(GameEvent::HoleComplete(ScorePayload {
                hole: score.hole_index + 1,
                strokes: score.strokes,
                par: score.par,
                total_strokes: self.machine.total_strokes(),
                total_par: self.machine.total_par(),
            })),
            HoleEvent::GameComplete {
                total_strokes,
                total_par,
                scorecard,
            } => {
                let last = scorecard.last();
                Some(GameEvent::GameComplete(ScorePayload {
                    hole: scorecard.len(),
                    strokes: last.map_or(0, |s| s.strokes),
                    par: last.map_or(0, |s| s.par),
                    total_strokes: *total_strokes,
                    total_par: *total_par,
                }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::StaticCourse;
    use crate::physics::testing::{StubBody, StubContacts};
    use crate::protocol::Frame;
    use crate::{CourseSection, ShotTuning};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn reading(alpha: f64, beta: f64, t: f64) -> SensorReading {
        SensorReading {
            alpha: Some(alpha),
            beta,
            gamma: 0.0,
            timestamp_ms: t,
            ..Default::default()
        }
    }

    fn display() -> (DisplaySession<StaticCourse>, StubBody, StubContacts) {
        let course = StaticCourse::from_section(&CourseSection::default());
        let mut session = DisplaySession::new("abcd1234", &GameTuning::default(), course).unwrap();
        let mut ball = StubBody::default();
        let mut contacts = StubContacts::default();
        assert!(session.begin(&mut ball, &mut contacts).is_some());
        assert_eq!(contacts.observers.len(), 1);
        (session, ball, contacts)
    }

    #[test]
    fn empty_room_refused() {
        let tuning = GameTuning::default();
        assert_eq!(
            ControllerSession::new("", &tuning, ControllerMode::Swing).err(),
            Some(SessionError::MissingRoom)
        );
        let course = StaticCourse::from_section(&CourseSection::default());
        assert!(matches!(
            DisplaySession::new("  ", &tuning, course),
            Err(SessionError::MissingRoom)
        ));
    }

    #[test]
    fn orientation_only_while_aiming() {
        let mut c = ControllerSession::new("r", &GameTuning::default(), ControllerMode::Swing)
            .unwrap();
        assert!(c.on_sensor(&reading(10.0, 0.0, 0.0)).is_none());
        assert_eq!(c.start_aiming(), GameEvent::AimStart);
        match c.on_sensor(&reading(90.0, 0.0, 10.0)) {
            Some(GameEvent::Orientation(p)) => {
                assert!(close(p.x, 1.0));
                assert!(close(p.z.abs(), 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        // throttled
        assert!(c.on_sensor(&reading(91.0, 0.0, 20.0)).is_none());
        assert!(c.on_sensor(&reading(92.0, 0.0, 70.0)).is_some());
        assert!(close(c.stop_aiming(), 92.0));
        assert!(c.on_sensor(&reading(93.0, 0.0, 200.0)).is_none());
    }

    #[test]
    fn tap_is_not_a_swing() {
        let mut c = ControllerSession::new("r", &GameTuning::default(), ControllerMode::Swing)
            .unwrap();
        c.start_putt();
        for i in 0..3 {
            c.on_sensor(&reading(0.0, i as f64, i as f64 * 10.0));
        }
        assert!(matches!(
            c.release_putt(),
            Err(SwingError::TooShort { samples: 3, .. })
        ));
        assert!(!c.is_putting());
    }

    #[test]
    fn swing_end_to_end() {
        let tuning = GameTuning::default();
        let mut c = ControllerSession::new("r", &tuning, ControllerMode::Swing).unwrap();
        let (mut d, mut ball, _contacts) = display();

        // aim at 90 degrees on both devices
        let ev = c.start_aiming();
        d.handle(ev, 0.0, &mut ball).unwrap();
        if let Some(ev) = c.on_sensor(&reading(90.0, 0.0, 0.0)) {
            d.handle(ev, 0.0, &mut ball).unwrap();
        }
        assert!(close(c.stop_aiming(), 90.0));

        // 5 samples, 0 -> 10 degrees of yaw, one 3 degree beta jump in 10ms
        c.start_putt();
        let trace = [
            (90.0, 0.0, 100.0),
            (92.0, 0.0, 110.0),
            (95.0, 3.0, 120.0),
            (98.0, 3.0, 130.0),
            (100.0, 3.0, 140.0),
        ];
        for (alpha, beta, t) in trace {
            c.on_sensor(&reading(alpha, beta, t));
        }
        let events = c.release_putt().unwrap();
        let report = c.last_report().unwrap();
        assert!(close(report.peak_speed, 300.0));
        assert!(close(report.shot.final_angle_degrees, 100.0));
        assert!(close(report.shot.power, 1.0));

        // through the wire format and onto the ball
        assert_eq!(events.len(), 1);
        let wire = events[0].encode();
        let decoded = GameEvent::decode(&Frame::new(wire.event, wire.data)).unwrap();
        let outcome = d.handle(decoded, 200.0, &mut ball).unwrap().unwrap();
        assert_eq!(outcome.strokes, 1);
        let heading = heading_of(outcome.applied.impulse);
        assert!(close(heading, 100.0));
        assert!(close(outcome.applied.force, ShotTuning::default().max_force));
        assert!(d.hole_state().ball_in_motion);
    }

    #[test]
    fn late_snap_survives_long_backswing() {
        let tuning = GameTuning::default();
        let mut c = ControllerSession::new("r", &tuning, ControllerMode::Swing).unwrap();
        c.start_aiming();
        c.on_sensor(&reading(0.0, 0.0, 0.0));
        assert!(close(c.stop_aiming(), 0.0));

        // 660 samples of slow backswing at 10 deg/s, past the 600 cap
        c.start_putt();
        for i in 0..660 {
            c.on_sensor(&reading(0.0, i as f64 * 0.1, 100.0 + i as f64 * 10.0));
        }
        // then 30 degrees in 100ms while the heading drifts 0 -> 10
        let (beta0, t0) = (65.9, 100.0 + 659.0 * 10.0);
        for k in 1..=10 {
            let k = k as f64;
            c.on_sensor(&reading(k, beta0 + 3.0 * k, t0 + 10.0 * k));
        }

        c.release_putt().unwrap();
        let report = c.last_report().unwrap();
        assert!((report.peak_speed - 300.0).abs() < 1e-6);
        assert!((report.shot.power - 1.0).abs() < 1e-6);
        assert!((report.deviation_degrees - 10.0).abs() < 1e-9);
    }

    #[test]
    fn throw_mode_sends_scaled_vector() {
        let tuning = GameTuning::default();
        let mut c = ControllerSession::new("r", &tuning, ControllerMode::Throw).unwrap();
        c.start_aiming();
        c.on_sensor(&reading(0.0, 0.0, 0.0));
        c.stop_aiming();
        c.start_putt();
        for i in 0..5 {
            // 4.5 degrees per 10ms -> 450 deg/s, clamps to power 1.5
            c.on_sensor(&reading(0.0, i as f64 * 4.5, i as f64 * 10.0));
        }
        let events = c.release_putt().unwrap();
        match &events[..] {
            [GameEvent::Throw(t)] => {
                assert!(close(t.power, 1.5));
                assert!(close(t.z, 30.0));
                assert!(close(t.x.abs(), 0.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejected_shot_leaves_strokes() {
        let (mut d, mut ball, _contacts) = display();
        let shot = GameEvent::SwingData(SwingPayload {
            deviation: 0.0,
            power: 0.5,
        });
        assert!(d.handle(shot.clone(), 0.0, &mut ball).unwrap().is_some());
        assert_eq!(
            d.handle(shot, 10.0, &mut ball),
            Err(ShotRejected::BallInMotion)
        );
        assert_eq!(d.hole_state().stroke_count, 1);
        assert_eq!(ball.impulses.len(), 1);
    }

    #[test]
    fn orientation_reopens_aim_after_lost_aim_start() {
        let (mut d, mut ball, _contacts) = display();
        let orient = |x: f64, z: f64| {
            GameEvent::Orientation(OrientationPayload { x, y: 0.0, z })
        };
        let swing = GameEvent::SwingData(SwingPayload {
            deviation: 0.0,
            power: 0.5,
        });

        d.handle(GameEvent::AimStart, 0.0, &mut ball).unwrap();
        d.handle(orient(1.0, 0.0), 0.0, &mut ball).unwrap();
        let first = d.handle(swing.clone(), 100.0, &mut ball).unwrap().unwrap();
        assert!(close(heading_of(first.applied.impulse), 90.0));
        assert_eq!(d.aim().phase(), AimPhase::Locked);

        ball.velocity = DVec3::ZERO;
        assert!(d.tick(5000.0, Some(&mut ball)).contains(&HoleEvent::Ready));

        // no aim_start this time, only the stream
        d.handle(orient(-1.0, 0.0), 5100.0, &mut ball).unwrap();
        assert_eq!(d.aim().phase(), AimPhase::Aiming);
        let second = d.handle(swing, 5200.0, &mut ball).unwrap().unwrap();
        assert!(close(heading_of(second.applied.impulse), -90.0));
    }

    #[test]
    fn throw_uses_display_aim() {
        let (mut d, mut ball, _contacts) = display();
        d.handle(
            GameEvent::Orientation(OrientationPayload {
                x: 1.0,
                y: 0.0,
                z: 0.0,
            }),
            0.0,
            &mut ball,
        )
        .unwrap();
        let outcome = d
            .handle(
                GameEvent::Throw(ThrowPayload {
                    x: 0.0,
                    y: 0.0,
                    z: 15.0,
                    power: 0.75,
                }),
                10.0,
                &mut ball,
            )
            .unwrap()
            .unwrap();
        assert!(close(heading_of(outcome.applied.impulse), 90.0));
    }

    #[test]
    fn non_finite_orientation_rejected() {
        let (mut d, mut ball, _contacts) = display();
        let r = d.handle(
            GameEvent::Orientation(OrientationPayload {
                x: f64::INFINITY,
                y: 0.0,
                z: 1.0,
            }),
            0.0,
            &mut ball,
        );
        assert_eq!(r, Err(ShotRejected::InvalidInput));
        assert!(!d.aim().has_heading());
    }

    #[test]
    fn snap_points_aim_at_cup() {
        let (mut d, mut ball, _contacts) = display();
        d.snap_to_cup(&ball);
        // phone is pointing 70 degrees off; cup is straight down +Z
        d.handle(
            GameEvent::Orientation(OrientationPayload {
                x: 70f64.to_radians().sin(),
                y: 0.0,
                z: 70f64.to_radians().cos(),
            }),
            0.0,
            &mut ball,
        )
        .unwrap();
        assert!(close(d.aim().current_heading(), 0.0));
    }

    #[test]
    fn holed_ball_produces_score_event() {
        let (mut d, mut ball, _contacts) = display();
        d.handle(
            GameEvent::SwingData(SwingPayload {
                deviation: 0.0,
                power: 0.3,
            }),
            0.0,
            &mut ball,
        )
        .unwrap();
        ball.position = DVec3::new(0.0, 0.0, 4.0);
        ball.velocity = DVec3::ZERO;
        let events = d.tick(500.0, Some(&mut ball));
        assert_eq!(events.len(), 1);
        match d.score_event(&events[0]) {
            Some(GameEvent::HoleComplete(p)) => {
                assert_eq!(p.hole, 1);
                assert_eq!(p.strokes, 1);
                assert_eq!(p.par, 2);
                assert_eq!(p.relative_to_par(), -1);
            }
            other => panic!("unexpected {other:?}"),
        }
        // latched: further shots refused
        assert_eq!(
            d.handle(
                GameEvent::SwingData(SwingPayload {
                    deviation: 0.0,
                    power: 0.3
                }),
                600.0,
                &mut ball
            ),
            Err(ShotRejected::HoleCompleted)
        );
    }
}

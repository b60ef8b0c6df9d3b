//! Per-hole shot lifecycle: strokes, motion gating, cup detection,
//! out-of-bounds recovery, and hole-to-hole progression.
//!
//! Everything happens inside `tick()`: contact callbacks only enqueue, and
//! each tick reads the ball once and acts on that reading.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::HoleTuning;
use crate::course::{CourseFactory, HoleLayout};
use crate::physics::{ContactObserver, ContactQueue, ContactTarget, PhysicsBody};
use crate::shot::ShotGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HoleState {
    pub stroke_count: u32,
    pub par: u32,
    pub ball_in_motion: bool,
    /// One-shot latch: set on the tick the cup is detected, cleared on advance.
    pub course_completed: bool,
    pub current_course_index: usize,
}

/// Final tally for one hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleScore {
    pub hole_index: usize,
    pub strokes: u32,
    pub par: u32,
}

/// Which detection path saw the ball drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Per-tick distance/speed/height poll.
    Continuous,
    /// Engine contact callback, with looser thresholds.
    Contact,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoleEvent {
    HoleStarted {
        hole_index: usize,
        par: u32,
    },
    OutOfBounds {
        penalty: bool,
        strokes: u32,
    },
    /// Ball settled; the next shot is accepted.
    Ready,
    Holed {
        score: HoleScore,
        detection: Detection,
    },
    GameComplete {
        total_strokes: u32,
        total_par: u32,
        scorecard: Vec<HoleScore>,
    },
}

struct Thresholds {
    radius: f64,
    max_speed: f64,
    max_height: f64,
}

pub struct HoleStateMachine {
    tuning: HoleTuning,
    state: HoleState,
    layout: Option<HoleLayout>,
    last_shot_ms: f64,
    advance_at: Option<f64>,
    finished: bool,
    total_strokes: u32,
    total_par: u32,
    scorecard: Vec<HoleScore>,
    contacts: ContactQueue,
}

impl HoleStateMachine {
    pub fn new(tuning: HoleTuning) -> Self {
        Self {
            tuning,
            state: HoleState::default(),
            layout: None,
            last_shot_ms: f64::NEG_INFINITY,
            advance_at: None,
            finished: false,
            total_strokes: 0,
            total_par: 0,
            scorecard: Vec::new(),
            contacts: ContactQueue::new(),
        }
    }

    pub fn state(&self) -> &HoleState {
        &self.state
    }

    pub fn layout(&self) -> Option<&HoleLayout> {
        self.layout.as_ref()
    }

    pub fn scorecard(&self) -> &[HoleScore] {
        &self.scorecard
    }

    pub fn total_strokes(&self) -> u32 {
        self.total_strokes
    }

    pub fn total_par(&self) -> u32 {
        self.total_par
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn gate(&self) -> ShotGate {
        ShotGate {
            ball_in_motion: self.state.ball_in_motion,
            course_completed: self.state.course_completed || self.finished,
        }
    }

    /// Observer for the engine's contact callbacks. Contacts are evaluated on
    /// the next tick.
    pub fn contact_observer(&self) -> ContactObserver {
        self.contacts.observer()
    }

    /// Start the round on hole 0.
    pub fn begin(
        &mut self,
        course: &mut dyn CourseFactory,
        ball: &mut dyn PhysicsBody,
    ) -> Option<HoleEvent> {
        self.total_strokes = 0;
        self.total_par = 0;
        self.scorecard.clear();
        self.finished = false;
        self.advance_at = None;
        let layout = course.build(0, ball)?;
        Some(self.start_hole(0, layout))
    }

    /// Count an accepted shot. The only source of strokes besides the
    /// out-of-bounds penalty.
    pub fn record_stroke(&mut self, now_ms: f64) {
        self.state.stroke_count += 1;
        self.state.ball_in_motion = true;
        self.last_shot_ms = now_ms;
    }

    /// One physics tick. Without a ball (mid-transition) nothing happens.
    pub fn tick(
        &mut self,
        now_ms: f64,
        ball: Option<&mut dyn PhysicsBody>,
        course: &mut dyn CourseFactory,
    ) -> Vec<HoleEvent> {
        let mut events = Vec::new();
        let Some(ball) = ball else {
            return events;
        };
        let Some(layout) = self.layout else {
            return events;
        };
        if self.finished {
            self.contacts.drain();
            return events;
        }

        if let Some(at) = self.advance_at
            && now_ms >= at
        {
            self.contacts.drain();
            self.advance(ball, course, &mut events);
            return events;
        }

        for contact in self.contacts.drain() {
            if contact.target != ContactTarget::Cup {
                continue;
            }
            if let Some(ev) =
                self.check_hole(now_ms, contact.position, contact.velocity, Detection::Contact)
            {
                events.push(ev);
            }
        }

        if self.state.course_completed {
            return events;
        }

        let position = ball.position();
        let velocity = ball.velocity();

        if self.is_out_of_bounds(position) {
            ball.set_position(layout.tee);
            ball.set_velocity(DVec3::ZERO);
            ball.set_angular_velocity(DVec3::ZERO);
            self.state.ball_in_motion = false;
            let penalty = self.state.stroke_count > 0;
            if penalty {
                self.state.stroke_count += 1;
            }
            events.push(HoleEvent::OutOfBounds {
                penalty,
                strokes: self.state.stroke_count,
            });
            return events;
        }

        self.attract(ball, position, layout.cup);

        if let Some(ev) = self.check_hole(now_ms, position, velocity, Detection::Continuous) {
            events.push(ev);
            return events;
        }

        if self.state.ball_in_motion
            && velocity.length() < self.tuning.settle_speed
            && now_ms - self.last_shot_ms > self.tuning.settle_grace_ms
        {
            self.state.ball_in_motion = false;
            events.push(HoleEvent::Ready);
        }

        events
    }

    /// Evaluate one detection path. Edge-triggered: once the latch is set,
    /// repeated calls return `None` until the next hole starts.
    pub fn check_hole(
        &mut self,
        now_ms: f64,
        position: DVec3,
        velocity: DVec3,
        detection: Detection,
    ) -> Option<HoleEvent> {
        if self.state.course_completed || self.finished {
            return None;
        }
        let layout = self.layout?;
        let t = self.thresholds(detection);

        let offset = position - layout.cup;
        let distance = offset.x.hypot(offset.z);
        let horizontal_speed = velocity.x.hypot(velocity.z);
        if distance >= t.radius || horizontal_speed >= t.max_speed || offset.y.abs() >= t.max_height
        {
            return None;
        }

        self.state.course_completed = true;
        let score = HoleScore {
            hole_index: self.state.current_course_index,
            strokes: self.state.stroke_count,
            par: self.state.par,
        };
        self.total_strokes += score.strokes;
        self.total_par += score.par;
        self.scorecard.push(score);
        self.advance_at = Some(now_ms + self.tuning.advance_delay_ms);
        Some(HoleEvent::Holed { score, detection })
    }

    fn thresholds(&self, detection: Detection) -> Thresholds {
        let t = &self.tuning;
        match detection {
            Detection::Continuous => Thresholds {
                radius: t.cup_radius * t.capture_radius_factor,
                max_speed: t.capture_max_speed,
                max_height: t.capture_max_height,
            },
            Detection::Contact => Thresholds {
                radius: t.cup_radius * t.contact_radius_factor,
                max_speed: t.contact_max_speed,
                max_height: t.contact_max_height,
            },
        }
    }

    fn is_out_of_bounds(&self, p: DVec3) -> bool {
        p.y < self.tuning.out_of_bounds_y
            || p.x.abs() > self.tuning.boundary_limit
            || p.z.abs() > self.tuning.boundary_limit
    }

    /// Pull toward the cup near the lip, strongest at the center.
    fn attract(&self, ball: &mut dyn PhysicsBody, position: DVec3, cup: DVec3) {
        let to_cup = DVec3::new(cup.x - position.x, 0.0, cup.z - position.z);
        let distance = to_cup.length();
        let radius = self.tuning.attraction_radius;
        if distance >= radius || distance < 1e-6 {
            return;
        }
        let scale = self.tuning.attraction_strength * (1.0 - distance / radius);
        ball.apply_force(to_cup / distance * scale);
    }

    fn start_hole(&mut self, index: usize, layout: HoleLayout) -> HoleEvent {
        self.layout = Some(layout);
        self.state = HoleState {
            stroke_count: 0,
            par: layout.par,
            ball_in_motion: false,
            course_completed: false,
            current_course_index: index,
        };
        self.last_shot_ms = f64::NEG_INFINITY;
        HoleEvent::HoleStarted {
            hole_index: index,
            par: layout.par,
        }
    }

    fn advance(
        &mut self,
        ball: &mut dyn PhysicsBody,
        course: &mut dyn CourseFactory,
        events: &mut Vec<HoleEvent>,
    ) {
        self.advance_at = None;
        let current = self.state.current_course_index;
        course.teardown(current);

        let next = current + 1;
        if next < course.hole_count()
            && let Some(layout) = course.build(next, ball)
        {
            events.push(self.start_hole(next, layout));
            return;
        }

        self.finished = true;
        events.push(HoleEvent::GameComplete {
            total_strokes: self.total_strokes,
            total_par: self.total_par,
            scorecard: self.scorecard.clone(),
        });
    }
}

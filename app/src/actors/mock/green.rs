//! Flat putting green for the headless display.
//!
//! Unit-mass ball on the `y = 0` plane with constant rolling deceleration.
//! Impulses change velocity directly; forces integrate over one step. A cup
//! sensor reports a contact on every step the ball is over the cup.

use glam::DVec3;

use puttlink::{Contact, ContactObserver, ContactSource, ContactTarget, PhysicsBody};

/// Rolling deceleration, m/s².
pub const GREEN_DECEL: f64 = 1.5;

#[derive(Debug, Default)]
pub struct GreenBall {
    position: DVec3,
    velocity: DVec3,
    force: DVec3,
}

impl PhysicsBody for GreenBall {
    fn position(&self) -> DVec3 {
        self.position
    }

    fn velocity(&self) -> DVec3 {
        self.velocity
    }

    fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    fn set_velocity(&mut self, velocity: DVec3) {
        self.velocity = velocity;
    }

    // no spin on a flat green
    fn set_angular_velocity(&mut self, _angular: DVec3) {}

    fn apply_impulse(&mut self, impulse: DVec3, _point: DVec3) {
        self.velocity += impulse;
    }

    fn apply_force(&mut self, force: DVec3) {
        self.force += force;
    }
}

#[derive(Default)]
pub struct CupSensor {
    cup: Option<(DVec3, f64)>,
    observers: Vec<ContactObserver>,
}

impl CupSensor {
    pub fn place(&mut self, cup: DVec3, radius: f64) {
        self.cup = Some((cup, radius));
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    fn check(&mut self, ball: &GreenBall) {
        let Some((cup, radius)) = self.cup else {
            return;
        };
        let offset = ball.position - cup;
        if offset.x.hypot(offset.z) >= radius {
            return;
        }
        let contact = Contact {
            target: ContactTarget::Cup,
            position: ball.position,
            velocity: ball.velocity,
        };
        for observer in &mut self.observers {
            observer(contact);
        }
    }
}

impl ContactSource for CupSensor {
    fn register_contact_observer(&mut self, observer: ContactObserver) {
        self.observers.push(observer);
    }
}

#[derive(Default)]
pub struct FlatGreen {
    pub ball: GreenBall,
    pub cup: CupSensor,
}

impl FlatGreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        let ball = &mut self.ball;
        ball.velocity += ball.force * dt;
        ball.force = DVec3::ZERO;
        ball.velocity.y = 0.0;

        let speed = ball.velocity.length();
        let slowdown = GREEN_DECEL * dt;
        ball.velocity = if speed <= slowdown {
            DVec3::ZERO
        } else {
            ball.velocity * ((speed - slowdown) / speed)
        };

        ball.position += ball.velocity * dt;
        ball.position.y = 0.0;

        self.cup.check(&self.ball);
    }

    pub fn is_resting(&self) -> bool {
        self.ball.velocity == DVec3::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn ball_rolls_to_a_stop() {
        let mut green = FlatGreen::new();
        green.ball.apply_impulse(DVec3::new(0.0, 0.05, 3.0), DVec3::ZERO);
        for _ in 0..(3 * 60) {
            green.step(DT);
        }
        assert!(green.is_resting());
        // v² / 2a = 3.0 m, within one step of slop
        let z = green.ball.position().z;
        assert!((z - 3.0).abs() < 0.1, "stopped at {z}");
        assert_eq!(green.ball.position().y, 0.0);
    }

    #[test]
    fn force_lasts_one_step() {
        let mut green = FlatGreen::new();
        green.ball.apply_force(DVec3::new(60.0, 0.0, 0.0));
        green.step(DT);
        let after_push = green.ball.velocity().x;
        assert!(after_push > 0.9);
        green.step(DT);
        assert!(green.ball.velocity().x < after_push);
    }

    #[test]
    fn cup_sensor_reports_overlap() {
        let mut green = FlatGreen::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        green
            .cup
            .register_contact_observer(Box::new(move |c| sink.lock().unwrap().push(c)));
        green.cup.place(DVec3::new(0.0, 0.0, 1.0), 0.2);

        green.step(DT);
        assert!(seen.lock().unwrap().is_empty());

        green.ball.set_position(DVec3::new(0.1, 0.0, 1.0));
        green.step(DT);
        let contacts = seen.lock().unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].target, ContactTarget::Cup);
    }
}

//! Shot applier: descriptor or raw vector -> physics impulse.

use std::fmt;

use glam::DVec3;

use crate::ShotTuning;
use crate::aim::direction_from_heading;
use crate::physics::PhysicsBody;
use crate::swing::ShotDescriptor;

/// What drives the shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotInput {
    /// Analyzed swing: angle and normalized power.
    Descriptor(ShotDescriptor),
    /// Raw swing vector; strength comes from its magnitude.
    Vector(DVec3),
}

/// Ball flags the applier gates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShotGate {
    pub ball_in_motion: bool,
    pub course_completed: bool,
}

/// Why a shot was not applied. Rejections change nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotRejected {
    BallInMotion,
    HoleCompleted,
    InvalidInput,
    NoDirection,
}

impl fmt::Display for ShotRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BallInMotion => write!(f, "wait for the ball to stop"),
            Self::HoleCompleted => write!(f, "hole already complete"),
            Self::InvalidInput => write!(f, "shot data was not usable"),
            Self::NoDirection => write!(f, "no aim direction"),
        }
    }
}

impl std::error::Error for ShotRejected {}

/// The impulse that was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedImpulse {
    pub impulse: DVec3,
    pub force: f64,
    pub point: DVec3,
}

#[derive(Debug, Clone)]
pub struct ShotApplier {
    tuning: ShotTuning,
}

impl ShotApplier {
    pub fn new(tuning: ShotTuning) -> Self {
        Self { tuning }
    }

    /// Quadratic below half power for fine putting control, linear above.
    pub fn curve(normalized: f64) -> f64 {
        if normalized < 0.5 {
            normalized * normalized * 2.0
        } else {
            normalized
        }
    }

    /// Force for a raw swing magnitude.
    pub fn force_for_magnitude(&self, magnitude: f64) -> f64 {
        let normalized = (magnitude / self.tuning.full_magnitude).clamp(0.0, 1.0);
        self.lerp_force(Self::curve(normalized))
    }

    /// Force for a descriptor power in `[0, max_power]`; overswing runs past
    /// `max_force`.
    pub fn force_for_power(&self, power: f64) -> f64 {
        self.lerp_force(power.clamp(0.0, self.tuning.max_power))
    }

    fn lerp_force(&self, t: f64) -> f64 {
        self.tuning.min_force + t * (self.tuning.max_force - self.tuning.min_force)
    }

    /// Apply one shot. `aim` (when known) sets the horizontal direction of a
    /// raw vector shot; the vector still sets the strength.
    pub fn apply(
        &self,
        input: ShotInput,
        gate: ShotGate,
        aim: Option<DVec3>,
        body: &mut dyn PhysicsBody,
    ) -> Result<AppliedImpulse, ShotRejected> {
        if gate.course_completed {
            return Err(ShotRejected::HoleCompleted);
        }
        if gate.ball_in_motion {
            return Err(ShotRejected::BallInMotion);
        }

        let (direction, force) = match input {
            ShotInput::Descriptor(d) => {
                if !d.final_angle_degrees.is_finite() || !d.power.is_finite() {
                    return Err(ShotRejected::InvalidInput);
                }
                (
                    direction_from_heading(d.final_angle_degrees),
                    self.force_for_power(d.power),
                )
            }
            ShotInput::Vector(v) => {
                if !v.is_finite() {
                    return Err(ShotRejected::InvalidInput);
                }
                let source = aim.filter(|a| a.is_finite()).unwrap_or(v);
                let horizontal = DVec3::new(source.x, 0.0, source.z);
                let direction = horizontal
                    .try_normalize()
                    .ok_or(ShotRejected::NoDirection)?;
                (direction, self.force_for_magnitude(v.length()))
            }
        };

        let impulse = direction * force + DVec3::Y * self.tuning.upward_impulse;
        let point = body.position();

        // start from rest regardless of residual jitter
        body.set_velocity(DVec3::ZERO);
        body.set_angular_velocity(DVec3::ZERO);
        body.wake_up();
        body.apply_impulse(impulse, point);

        Ok(AppliedImpulse {
            impulse,
            force,
            point,
        })
    }
}

impl Default for ShotApplier {
    fn default() -> Self {
        Self::new(ShotTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::testing::StubBody;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rejects_while_in_motion() {
        let applier = ShotApplier::default();
        let mut body = StubBody::default();
        let gate = ShotGate {
            ball_in_motion: true,
            course_completed: false,
        };
        let shot = ShotInput::Vector(DVec3::new(0.0, 0.0, 10.0));
        assert_eq!(
            applier.apply(shot, gate, None, &mut body),
            Err(ShotRejected::BallInMotion)
        );
        assert!(body.impulses.is_empty());
    }

    #[test]
    fn rejects_after_hole_complete() {
        let applier = ShotApplier::default();
        let mut body = StubBody::default();
        let gate = ShotGate {
            ball_in_motion: false,
            course_completed: true,
        };
        let shot = ShotInput::Descriptor(ShotDescriptor {
            final_angle_degrees: 0.0,
            power: 1.0,
        });
        assert_eq!(
            applier.apply(shot, gate, None, &mut body),
            Err(ShotRejected::HoleCompleted)
        );
        assert!(body.impulses.is_empty());
    }

    #[test]
    fn power_curve() {
        assert!(close(ShotApplier::curve(0.25), 0.125));
        assert!(close(ShotApplier::curve(0.5), 0.5));
        assert!(close(ShotApplier::curve(0.8), 0.8));

        let applier = ShotApplier::default();
        let t = ShotTuning::default();
        assert!(close(applier.force_for_magnitude(0.0), t.min_force));
        assert!(close(applier.force_for_magnitude(30.0), t.max_force));
        assert!(close(applier.force_for_magnitude(300.0), t.max_force));
        let quarter = t.min_force + 0.125 * (t.max_force - t.min_force);
        assert!(close(applier.force_for_magnitude(7.5), quarter));
    }

    #[test]
    fn descriptor_overswing_exceeds_max() {
        let applier = ShotApplier::default();
        let t = ShotTuning::default();
        let over = applier.force_for_power(1.5);
        assert!(close(over, t.min_force + 1.5 * (t.max_force - t.min_force)));
        assert!(close(applier.force_for_power(9.0), over));
    }

    #[test]
    fn power_ceiling_follows_tuning() {
        let t = ShotTuning {
            max_power: 1.2,
            ..ShotTuning::default()
        };
        let applier = ShotApplier::new(t.clone());
        let ceiling = t.min_force + 1.2 * (t.max_force - t.min_force);
        assert!(close(applier.force_for_power(1.5), ceiling));
        assert!(close(applier.force_for_power(-1.0), t.min_force));
    }

    #[test]
    fn aim_overrides_vector_direction() {
        let applier = ShotApplier::default();
        let mut body = StubBody::at(DVec3::new(1.0, 0.0, 2.0));
        let swing = DVec3::new(0.0, 0.0, 30.0);
        let aim = Some(DVec3::new(5.0, 0.7, 0.0));
        let applied = applier
            .apply(ShotInput::Vector(swing), ShotGate::default(), aim, &mut body)
            .unwrap();
        assert!(close(applied.force, ShotTuning::default().max_force));
        assert!(close(applied.impulse.x, applied.force));
        assert!(close(applied.impulse.z, 0.0));
        assert!(close(applied.impulse.y, ShotTuning::default().upward_impulse));
        assert_eq!(applied.point, DVec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn clears_motion_before_impulse() {
        let applier = ShotApplier::default();
        let mut body = StubBody::default();
        body.velocity = DVec3::new(0.01, 0.0, -0.02);
        body.angular = DVec3::ONE;
        let shot = ShotInput::Descriptor(ShotDescriptor {
            final_angle_degrees: 90.0,
            power: 1.0,
        });
        let applied = applier
            .apply(shot, ShotGate::default(), None, &mut body)
            .unwrap();
        assert_eq!(body.velocity_at_impulse, vec![DVec3::ZERO]);
        assert_eq!(body.angular, DVec3::ZERO);
        assert_eq!(body.wakes, 1);
        assert!(close(applied.impulse.x, ShotTuning::default().max_force));
    }

    #[test]
    fn vertical_vector_without_aim_has_no_direction() {
        let applier = ShotApplier::default();
        let mut body = StubBody::default();
        let r = applier.apply(
            ShotInput::Vector(DVec3::new(0.0, 5.0, 0.0)),
            ShotGate::default(),
            None,
            &mut body,
        );
        assert_eq!(r, Err(ShotRejected::NoDirection));
    }

    #[test]
    fn non_finite_input_rejected() {
        let applier = ShotApplier::default();
        let mut body = StubBody::default();
        let r = applier.apply(
            ShotInput::Vector(DVec3::new(f64::NAN, 0.0, 1.0)),
            ShotGate::default(),
            None,
            &mut body,
        );
        assert_eq!(r, Err(ShotRejected::InvalidInput));
        assert!(body.impulses.is_empty());
    }
}

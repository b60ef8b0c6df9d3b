//! Course construction seam. Geometry and obstacles are built by the
//! rendering side; the state machine only needs par, tee, and cup.

use glam::DVec3;

use crate::CourseSection;
use crate::physics::PhysicsBody;

/// What the state machine needs to know about one hole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoleLayout {
    pub par: u32,
    pub tee: DVec3,
    pub cup: DVec3,
}

/// Builds and tears down holes. Invoked once per hole by the state machine.
pub trait CourseFactory {
    fn hole_count(&self) -> usize;

    /// Build hole `index`, place the ball on its tee, and return its layout.
    /// `None` if the index is out of range.
    fn build(&mut self, index: usize, ball: &mut dyn PhysicsBody) -> Option<HoleLayout>;

    /// Remove hole `index` geometry. Default: nothing to remove.
    fn teardown(&mut self, _index: usize) {}
}

/// A course defined entirely by data.
#[derive(Debug, Clone)]
pub struct StaticCourse {
    holes: Vec<HoleLayout>,
}

impl StaticCourse {
    pub fn new(holes: Vec<HoleLayout>) -> Self {
        Self { holes }
    }

    pub fn from_section(section: &CourseSection) -> Self {
        Self::new(
            section
                .holes
                .iter()
                .map(|h| HoleLayout {
                    par: h.par.max(1),
                    tee: DVec3::from_array(h.tee),
                    cup: DVec3::from_array(h.cup),
                })
                .collect(),
        )
    }

    pub fn layout(&self, index: usize) -> Option<&HoleLayout> {
        self.holes.get(index)
    }
}

impl CourseFactory for StaticCourse {
    fn hole_count(&self) -> usize {
        self.holes.len()
    }

    fn build(&mut self, index: usize, ball: &mut dyn PhysicsBody) -> Option<HoleLayout> {
        let layout = *self.holes.get(index)?;
        ball.set_position(layout.tee);
        ball.set_velocity(DVec3::ZERO);
        ball.set_angular_velocity(DVec3::ZERO);
        Some(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::testing::StubBody;

    #[test]
    fn build_places_ball_on_tee() {
        let mut course = StaticCourse::from_section(&CourseSection::default());
        assert_eq!(course.hole_count(), 3);
        let mut ball = StubBody::at(DVec3::new(9.0, 9.0, 9.0));
        ball.velocity = DVec3::X;
        let layout = course.build(1, &mut ball).unwrap();
        assert_eq!(layout.par, 3);
        assert_eq!(ball.position, layout.tee);
        assert_eq!(ball.velocity, DVec3::ZERO);
        assert!(course.build(3, &mut ball).is_none());
    }

    #[test]
    fn par_is_at_least_one() {
        let section = CourseSection {
            holes: vec![crate::HoleSection {
                par: 0,
                tee: [0.0; 3],
                cup: [0.0, 0.0, 1.0],
            }],
        };
        let course = StaticCourse::from_section(&section);
        assert_eq!(course.layout(0).map(|l| l.par), Some(1));
    }
}
